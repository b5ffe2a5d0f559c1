//! Pseudo-translation of XLIFF documents
//!
//! Downloaded translations are faked by replacing the characters of every
//! `<target>` with look-alikes carrying diacritics, so "Hello" becomes
//! "Ħéļļō". The result stays readable while making untranslated strings
//! easy to spot.
//!
//! Inline markup and entity references inside a target are kept as they
//! are. Scenarios may post-process each translated unit and the whole
//! document, see [`Scenario::post_translate_unit`] and
//! [`Scenario::post_translate_document`].

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{trace, warn};

use crate::mock::scenarios::Scenario;

static TRANS_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<trans-unit\b[^>]*>.*?</trans-unit>").expect("valid trans-unit pattern")
});

/// First target of a unit, either with content or self-closing
static TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<target\b([^>]*?)(?:/>|>(.*?)</target>)").expect("valid target pattern")
});

/// Markup and entity references, which must not be translated
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>|<[^>]*>|&[#\w]+;").expect("valid markup pattern")
});

/// Look-alike of a single character. Characters without one are kept.
pub fn pseudo_char(c: char) -> char {
    match c {
        'a' => 'â',
        'b' => 'ƀ',
        'c' => 'ƈ',
        'd' => 'ď',
        'e' => 'é',
        'f' => 'ḟ',
        'g' => 'ġ',
        'h' => 'ĥ',
        'i' => 'ĩ',
        'j' => 'ɉ',
        'k' => 'ķ',
        'l' => 'ļ',
        'm' => 'Ɯ',
        'n' => 'ň',
        'o' => 'ō',
        'p' => 'ƥ',
        'q' => 'ƌ',
        'r' => 'ȑ',
        's' => 'ș',
        't' => 'ț',
        'u' => 'ǚ',
        'v' => '˄',
        'w' => 'ŵ',
        'x' => 'ˣ',
        'y' => 'ʎ',
        'z' => 'ź',
        'ä' => 'å',
        'ö' => 'õ',
        'ü' => 'û',
        'A' => 'Â',
        'B' => 'ß',
        'C' => 'Ç',
        'D' => 'Ð',
        'E' => 'Ë',
        'F' => 'Ƹ',
        'G' => 'Ġ',
        'H' => 'Ħ',
        'I' => 'Ĭ',
        'J' => 'Ĵ',
        'K' => 'Ķ',
        'L' => 'Ŀ',
        'M' => 'Щ',
        'N' => 'Ň',
        'O' => 'Õ',
        'P' => 'Þ',
        'Q' => 'Ƣ',
        'R' => 'Ȑ',
        'S' => 'Ș',
        'T' => 'Ʈ',
        'U' => 'Ǚ',
        'V' => 'Ʌ',
        'W' => 'ʩ',
        'X' => 'Ӿ',
        'Y' => 'Ӌ',
        'Z' => 'Ϟ',
        'Ä' => 'Ā',
        'Ö' => 'Ō',
        'Ü' => 'Ŭ',
        '0' => '♡',
        '1' => 'Ⅰ',
        '2' => 'Ⅱ',
        '3' => 'Ⅲ',
        '4' => 'Ⅳ',
        '5' => 'Ⅴ',
        '6' => 'Ⅵ',
        '7' => 'Ⅶ',
        '8' => 'Ⅷ',
        '9' => 'Ⅸ',
        '_' => '☂',
        other => other,
    }
}

/// Pseudo-translate plain text
///
/// # Example
///
/// ```ignore
/// assert_eq!(pseudo_translate_text("Hello"), "Ħéļļō");
/// ```
pub fn pseudo_translate_text(text: &str) -> String {
    text.chars().map(pseudo_char).collect()
}

/// Pseudo-translate the character data of XML content, keeping markup
/// and entity references
pub fn pseudo_translate_content(content: &str) -> String {
    let mut result = String::with_capacity(content.len() * 2);
    let mut last = 0;
    for markup in MARKUP.find_iter(content) {
        result.push_str(&pseudo_translate_text(&content[last..markup.start()]));
        result.push_str(markup.as_str());
        last = markup.end();
    }
    result.push_str(&pseudo_translate_text(&content[last..]));
    result
}

/// Pseudo-translate the first target of every trans-unit in an XLIFF
/// document
///
/// The unit hook of `scenario` runs on each translated target, the
/// document hook once on the result.
///
/// # Arguments
///
/// * `document` - the XLIFF document as exported for translation
/// * `scenario` - scenario to post-process the translation
pub fn translate_xliff(document: &str, scenario: &dyn Scenario) -> String {
    let translated = TRANS_UNIT.replace_all(document, |unit: &Captures| {
        translate_unit(&unit[0], scenario)
    });
    scenario.post_translate_document(translated.into_owned())
}

fn translate_unit(unit: &str, scenario: &dyn Scenario) -> String {
    let Some(target) = TARGET.captures(unit) else {
        warn!("Trans-unit without target, skipping: {}", unit);
        return unit.to_string();
    };
    let whole = target.get(0).map_or(0..0, |m| m.range());
    let attributes = target.get(1).map_or("", |m| m.as_str());
    let content = target.get(2).map_or("", |m| m.as_str());

    let translated = scenario.post_translate_unit(pseudo_translate_content(content));
    trace!("Pseudo-translated '{}' to '{}'", content, translated);

    let mut result = String::with_capacity(unit.len() * 2);
    result.push_str(&unit[..whole.start]);
    if translated.is_empty() && target.get(2).is_none() {
        result.push_str(&unit[whole.clone()]);
    } else {
        result.push_str(&format!("<target{}>{}</target>", attributes, translated));
    }
    result.push_str(&unit[whole.end..]);
    result
}
