use std::sync::LazyLock;

use regex::Regex;

static PIXIV_LINK_ID_REGEX: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"^(?:(?:https?:\/\/)?(?:www\.)?(?:pixiv\.net\/)(?:(?:en\/)?artworks\/|i\/|member_illust\.php\?(?:[^#]*&)?illust_id=))?([0-9]+)\/?(?:[#\?&].*)?$")
    .expect("Pixiv Link+ID regex construct failed.")
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IllustLinkParseResult {
    Success(u64),
    InvalidId,
    NotMatch
}

/// Accepts artwork links, legacy `member_illust.php` links and bare ids
pub fn parse_illust_link(text: &str) -> IllustLinkParseResult {
    let Some((_, [id_str])) = PIXIV_LINK_ID_REGEX.captures(text.trim()).map(|c| c.extract()) else {
        return IllustLinkParseResult::NotMatch;
    };
    let Ok(id) = id_str.parse::<u64>() else {
        return IllustLinkParseResult::InvalidId;
    };
    IllustLinkParseResult::Success(id)
}

pub fn api_meta_url(id: u64) -> String {
    format!("https://www.pixiv.net/ajax/illust/{}/ugoira_meta", id)
}

pub fn legacy_page_url(id: u64) -> String {
    format!("https://www.pixiv.net/member_illust.php?mode=medium&illust_id={}", id)
}
