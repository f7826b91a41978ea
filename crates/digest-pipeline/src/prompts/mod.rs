//! Prompt construction
//!
//! The user prompt is a single minijinja template. Rendering is a pure
//! function of its inputs: the same market report, headlines and snapshot
//! always produce byte-identical text.

use crate::error::Result;
use crate::market::MarketReport;
use crate::news::{NewsItem, format_news};
use crate::snapshot::MISSING_SNAPSHOT;
use minijinja::{Environment, context};
use std::fmt;

/// System persona sent with every completion
pub const SYSTEM_PERSONA: &str =
    "你是一名面向小红书读者的加密市场解说员，语气亲和、简洁、有画面感。";

const DIGEST_TEMPLATE_NAME: &str = "digest_zh";
const DIGEST_TEMPLATE: &str = include_str!("digest_zh.jinja");

/// A rendered prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)
    }
}

/// Render the digest prompt
pub fn build_prompt(
    market: &MarketReport,
    news: &[NewsItem],
    snapshot: Option<&str>,
) -> Result<Prompt> {
    let mut env = Environment::new();
    env.add_template(DIGEST_TEMPLATE_NAME, DIGEST_TEMPLATE)?;

    let user = env.get_template(DIGEST_TEMPLATE_NAME)?.render(context! {
        hours => market.window.hours,
        snapshot => snapshot.unwrap_or(MISSING_SNAPSHOT),
        window_header => market.window.header(),
        market_block => market.format_block(),
        news_block => format_news(news, market.window.hours),
    })?;

    Ok(Prompt {
        system: SYSTEM_PERSONA.to_string(),
        user,
    })
}
