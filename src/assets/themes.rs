//! Theme tables: which parachutes and pads a theme uses, and the fallback
//! sprite picked for an emote drop

use rand::seq::SliceRandom;
use rand::Rng;

use crate::game::avatar::SPRITE_COUNT;

const BASE: &str = "base";

fn parachutes(theme: &str) -> Option<&'static [&'static str]> {
    let table: &'static [&'static str] = match theme {
        "base" => &[
            "chute_black.png",
            "chute_blue.png",
            "chute_green.png",
            "chute_pink.png",
            "chute_purple.png",
            "chute_yellow.png",
        ],
        "multi" => &[
            "chute_black_blue.png",
            "chute_black_green.png",
            "chute_blue_green.png",
            "chute_pink_blue.png",
            "chute_white_blue.png",
            "chute_white_green.png",
        ],
        "retro" => &["chute_retro.png"],
        "autumn" => &[
            "autumn_theme/chute_brown1.png",
            "autumn_theme/chute_orange1.png",
            "autumn_theme/chute_red1.png",
            "autumn_theme/chute_yellow1.png",
            "autumn_theme/chute_green1.png",
        ],
        "christmas" => &[
            "christmas_eve/chute_ribbon_red.png",
            "christmas_eve/chute_ribbon_green.png",
            "christmas_eve/chute_ribbon_blue.png",
            "christmas_eve/chute_ribbon_pink.png",
            "christmas_eve/chute_ribbon_yellow.png",
        ],
        "winter" => &[
            "winter_theme/chute_snowflake.png",
            "winter_theme/parachute_snow.png",
            "winter_theme/chute_snowflake1.png",
            "winter_theme/chute_snowflake2.png",
        ],
        "spring" => &[
            "spring_theme/hot_air_balloon_pink.png",
            "spring_theme/para_balloon_peach.png",
            "spring_theme/hot_air_balloon_orange.png",
            "spring_theme/hot_air_balloon_purple.png",
            "spring_theme/para_balloon_pink.png",
        ],
        "valentine" => &[
            "valentines/balloon_heart_red.png",
            "valentines/balloon_heart_pink.png",
            "valentines/balloon_heart_gold.png",
            "valentines/balloon_heart_brown.png",
            "valentines/balloon_heart_white.png",
        ],
        "pride" => &[
            "pride_theme/chute_rainbow.png",
            "pride_theme/chute_plane_gay.png",
            "pride_theme/chute_plane_lesbian.png",
            "pride_theme/chute_plane_bisexual.png",
            "pride_theme/chute_plane_transgender.png",
        ],
        "halloween" => &["chute_black.png", "chute_purple.png", "cauldron/cauldron_base.png"],
        "easter" => &["chute_pink.png", "chute_yellow.png", "chute_green.png"],
        "summer" => &["chute_yellow.png", "chute_blue.png", "chute_green.png", "chute_pink.png"],
        "pool" => &["target_pool_blue.png", "target_pool_red.png"],
        _ => return None,
    };
    Some(table)
}

fn pads(theme: &str) -> Option<&'static [&'static str]> {
    let table: &'static [&'static str] = match theme {
        "base" | "retro" | "night" | "light" | "pride" => {
            &["target_pool_red.png", "target_pool_blue.png"]
        }
        "pool" | "summer" => &["target_pool_blue.png", "target_pool_red.png"],
        "easter" => &[
            "easter_theme/target_easter1.png",
            "easter_theme/target_easter2.png",
            "easter_theme/target_easter3.png",
            "easter_theme/target_easter4.png",
            "easter_theme/target_easter5.png",
        ],
        "spring" => &["spring_theme/target.png", "spring_theme/target_spring_front.png"],
        "christmas" => &[
            "christmas_theme/target_christmas.png",
            "christmas_theme/target_christmas_front.png",
        ],
        "winter" => &[
            "winter_theme/target_winter.png",
            "winter_theme/target_winter_front.png",
        ],
        "autumn" => &["autumn_theme/target_leaves.png", "autumn_theme/target_leaves2.png"],
        "valentine" => &[
            "valentines/valentines_target_brown_red_nocredit.png",
            "valentines/valentines_target_white_pink_nocredit.png",
            "valentines/valentines_target_brown_gold_nocredit.png",
            "valentines/valentines_target_white_gold_nocredit.png",
        ],
        "halloween" => &["cauldron/cauldron1.png"],
        _ => return None,
    };
    Some(table)
}

fn pick<R: Rng + ?Sized>(
    table: fn(&str) -> Option<&'static [&'static str]>,
    theme: &str,
    rng: &mut R,
) -> &'static str {
    let theme = theme.to_lowercase();
    table(&theme)
        .or_else(|| table(BASE))
        .and_then(|choices| choices.choose(rng).copied())
        .unwrap_or_default()
}

/// Random parachute asset for a theme (unknown themes use the base set)
pub fn parachute_for_theme<R: Rng + ?Sized>(theme: &str, rng: &mut R) -> &'static str {
    pick(parachutes, theme, rng)
}

/// Random pad asset for a theme (unknown themes use the base set)
pub fn pad_for_theme<R: Rng + ?Sized>(theme: &str, rng: &mut R) -> &'static str {
    pick(pads, theme, rng)
}

/// Emotes with a known look
const EXACT_EMOTES: &[(&str, u8)] = &[
    ("emojiBlowKiss", 1),
    ("emojiCrave", 2),
    ("emojiLove", 3),
    ("emojiHeart", 4),
    ("emojiSmile", 5),
    ("emojiWink", 1),
    ("emojiKiss", 2),
    ("emojiHappy", 3),
    ("emojiCool", 4),
    ("emojiLaugh", 5),
    ("emojiAngel", 1),
    ("emojiSad", 2),
    ("emojiCry", 3),
    ("emojiMad", 4),
    ("emojiShock", 5),
    ("love", 3),
    ("aşk", 3),
];

/// Keyword groups, checked in order against the lowercased emote name
const KEYWORD_SPRITES: &[(&[&str], u8)] = &[
    (&["kalp", "heart", "love", "aşk"], 4),
    (&["happy", "smile", "gül", "mutlu"], 5),
    (&["cool", "awesome", "harika"], 1),
    (&["sad", "cry", "üzgün"], 2),
    (&["kiss", "öp"], 3),
];

/// Placeholder sprite number for an emote drop whose real image is not
/// available (yet)
pub fn emote_fallback_sprite<R: Rng + ?Sized>(emote: &str, rng: &mut R) -> u8 {
    if let Some((_, sprite)) = EXACT_EMOTES.iter().find(|(name, _)| *name == emote) {
        return *sprite;
    }

    let lower = emote.to_lowercase();
    KEYWORD_SPRITES
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, sprite)| *sprite)
        .unwrap_or_else(|| rng.gen_range(1..=SPRITE_COUNT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn unknown_theme_falls_back_to_base() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let chute = parachute_for_theme("no-such-theme", &mut rng);
        assert!(parachutes(BASE).unwrap().contains(&chute));

        let pad = pad_for_theme("no-such-theme", &mut rng);
        assert!(pads(BASE).unwrap().contains(&pad));
    }

    #[test]
    fn theme_lookup_is_case_insensitive() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(pad_for_theme("Halloween", &mut rng), "cauldron/cauldron1.png");
        assert_eq!(parachute_for_theme("RETRO", &mut rng), "chute_retro.png");
    }

    #[test]
    fn emote_keywords_pick_matching_sprites() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(emote_fallback_sprite("emojiHeart", &mut rng), 4);
        assert_eq!(emote_fallback_sprite("bigHeartEyes", &mut rng), 4);
        assert_eq!(emote_fallback_sprite("SoHappy", &mut rng), 5);
        assert_eq!(emote_fallback_sprite("coolcat", &mut rng), 1);
        assert_eq!(emote_fallback_sprite("crying", &mut rng), 2);
        assert_eq!(emote_fallback_sprite("kissy", &mut rng), 3);

        for _ in 0..50 {
            let sprite = emote_fallback_sprite("zzz", &mut rng);
            assert!((1..=SPRITE_COUNT).contains(&sprite));
        }
    }
}
