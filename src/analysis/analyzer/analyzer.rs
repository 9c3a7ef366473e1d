use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Text in, tokens out.
///
/// Map builders hold one to normalize rule terms, and reload workers share
/// it across threads.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    fn name(&self) -> &str;
}
