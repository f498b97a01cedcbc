//! Message templates.
//!
//! Actions announce what happened with templates such as
//! `"{{player}} took {{resource}}"`. Placeholders name a committed argument,
//! or `player` for the acting player. Unknown placeholders are left as-is.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::core::{Args, PlayerId};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("placeholder regex must compile"));

/// Fill a template from the acting player and committed arguments.
#[must_use]
pub fn render(template: &str, player: PlayerId, args: &Args) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            match args.get(key) {
                Some(value) => value.to_string(),
                None if key == "player" => player.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{args, Argument, ElementRef};

    #[test]
    fn test_render_args_and_player() {
        let a = args([("resource", "oil".into()), ("amount", Argument::Number(2))]);
        assert_eq!(
            render("{{player}} took {{ amount }} {{resource}}", PlayerId::new(1), &a),
            "Player 1 took 2 oil"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{{who}} moved", PlayerId::new(0), &Args::new()), "{{who}} moved");
    }

    #[test]
    fn test_render_elements_and_lists() {
        let a = args([("cards", vec![ElementRef::new(3), ElementRef::new(5)].into())]);
        assert_eq!(render("discarded {{cards}}", PlayerId::new(0), &a), "discarded #3, #5");
    }

    #[test]
    fn test_player_argument_overrides_actor() {
        let a = args([("player", PlayerId::new(2).into())]);
        assert_eq!(render("{{player}} was chosen", PlayerId::new(0), &a), "Player 2 was chosen");
    }
}
