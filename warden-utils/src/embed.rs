use poise::serenity_prelude as serenity;

/// Default embed color used across the bot UI.
pub const DEFAULT_EMBED_COLOR: u32 = 0x90_55_30;

/// Build a plain notice embed with consistent styling.
///
/// The first line of `content` becomes the title when it is short enough,
/// the remainder becomes the description.
pub fn notice_embed(content: &str) -> serenity::CreateEmbed {
    let (title, description) = split_notice(content);

    let builder = serenity::CreateEmbed::new().color(DEFAULT_EMBED_COLOR);
    let builder = match title {
        Some(title) => builder.title(title.to_owned()),
        None => builder,
    };

    if description.is_empty() {
        builder
    } else {
        builder.description(description.to_owned())
    }
}

fn split_notice(content: &str) -> (Option<&str>, &str) {
    const MAX_TITLE_CHARS: usize = 256;

    let trimmed = content.trim();
    match trimmed.split_once('\n') {
        Some((first, rest)) if first.chars().count() <= MAX_TITLE_CHARS => {
            (Some(first.trim()), rest.trim())
        }
        _ => (None, trimmed),
    }
}
