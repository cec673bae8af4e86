//! Boundary to the external language-model service. The pipeline only sees
//! the [`Oracle`] trait; prompt wording for brand and domain lookups belongs
//! to the implementation, evidence prompts are built by the synthesizer.

use async_trait::async_trait;

use crate::core::error::VerifyError;
use crate::pipeline::normalizer::normalize;

pub mod brand;
pub mod openai;

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Raw reply of the brand-identification call; see [`brand::interpret`].
    async fn identify_brand(
        &self,
        screenshot: Option<&[u8]>,
        html: &str,
    ) -> Result<String, VerifyError>;

    /// Raw reply naming the brand's official domain.
    async fn legit_domain(&self, brand: &str) -> Result<String, VerifyError>;

    async fn explain(&self, prompt: &str) -> Result<String, VerifyError>;

    /// Raw reply expected to hold a 0.00-10.00 number.
    async fn rate_confidence(&self, prompt: &str) -> Result<String, VerifyError>;
}

/// First domain-looking token of a brand-to-domain reply, normalized.
/// "unknown", empty or dot-less replies yield `None`.
pub fn parse_domain_reply(reply: &str) -> Option<String> {
    reply
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | ',' | '*' | '<' | '>')))
        .map(|token| token.trim_end_matches('.'))
        .filter(|token| !token.eq_ignore_ascii_case("unknown"))
        .map(normalize)
        .find(|domain| domain.contains('.') && !domain.contains(' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_reply_variants() {
        assert_eq!(parse_domain_reply("examplebank.com"), Some("examplebank.com".into()));
        assert_eq!(
            parse_domain_reply("The official domain is https://www.ExampleBank.com."),
            Some("examplebank.com".into())
        );
        assert_eq!(parse_domain_reply("`paypal.com`"), Some("paypal.com".into()));
        assert_eq!(parse_domain_reply("unknown"), None);
        assert_eq!(parse_domain_reply("Unknown."), None);
        assert_eq!(parse_domain_reply(""), None);
        assert_eq!(parse_domain_reply("I am not sure"), None);
    }
}
