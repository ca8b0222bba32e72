//! Response post-processing
//!
//! A pure, ordered cleanup pipeline applied once generation has finished:
//!
//! 1. strip leading conversational filler (up to 3 stacked openers per pass)
//! 2. strip trailing closers and unsolicited next-step suggestions
//! 3. strip trailing follow-up questions (plain, bullet, numbered,
//!    header-led list, inline)
//! 4. tag untagged opening code fences as `plaintext`
//! 5. collapse 4+ newlines to at most two blank lines
//! 6. capitalize the first character
//! 7. strip a trailing lone `---` / `***` / `___`
//! 8. drop repeated paragraphs
//! 9. strip stray non-Latin runs from otherwise Latin text
//!
//! The pipeline is repeated until the text stops changing, so
//! `post_process(post_process(x)) == post_process(x)`. Step 1 is the only
//! bounded step; a longer run of openers is removed over several passes.

use crate::router::Intent;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Safety bound on full pipeline repetitions
const MAX_PIPELINE_PASSES: usize = 32;
const MAX_FILLER_PASSES: usize = 3;
/// Normalized prefix length used as the dedup key
pub const DEDUP_KEY_CHARS: usize = 120;
/// Paragraphs shorter than this (normalized) are never deduplicated
pub const DEDUP_MIN_CHARS: usize = 15;
/// Share of Latin letters above which foreign runs are treated as leakage
const LATIN_DOMINANCE: f64 = 0.8;
pub const DEFAULT_FENCE_LANGUAGE: &str = "plaintext";

const CLOSER_PHRASES: &str = r"i hope (?:this|that|it) helps|hope (?:this|that|it) helps|let me know if|feel free to|(?:don't|do not) hesitate to|happy coding|good luck|if you (?:have|need) any (?:other |more |further )?(?:questions|help|assistance)|if you'd like,? i can|i can also help|as a next step|you (?:might|may) also want to";

const FOLLOW_UP_OPENERS: &str = r"would you like|do you want|shall i|should i|want me to|can i help|may i help|is there anything else|anything else|are you (?:interested|looking)|would it help|do you need|need (?:help|more)|curious about|interested in|any (?:other|more|further) questions|what else|how else";

static LEADING_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\A\s*(?:(?:sure(?: thing)?|certainly|of course|absolutely|great question|good question|excellent question|okay|ok|alright|no problem|happy to help|i'?d be (?:happy|glad) to help|thanks for asking|thank you for asking)\s*[!.,:]+|(?:hi|hello|hey)(?: there)?\s*!+)\s*",
    )
    .expect("leading filler pattern is valid")
});

static CLOSER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\n[ \t]*(?:[*_]{{1,2}})?(?:{CLOSER_PHRASES})[^\n]*\s*\z"
    ))
    .expect("closer line pattern is valid")
});

static CLOSER_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)([.!?:)`])[ \t]+(?:{CLOSER_PHRASES})[^\n]*\z"
    ))
    .expect("closer sentence pattern is valid")
});

static FOLLOW_UP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\n[ \t]*(?:[*_]{{1,2}})?(?:{FOLLOW_UP_OPENERS})[^\n]*\?[*_ \t]*\s*\z"
    ))
    .expect("follow-up line pattern is valid")
});

static FOLLOW_UP_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\n[ \t]*[-*•+][ \t]+(?:[*_]{{1,2}})?(?:{FOLLOW_UP_OPENERS}|what about|how about|what if)[^\n]*\?[*_ \t]*\s*\z"
    ))
    .expect("follow-up bullet pattern is valid")
});

static FOLLOW_UP_NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\n[ \t]*\d+[.)][ \t]+(?:[*_]{{1,2}})?(?:{FOLLOW_UP_OPENERS}|what about|how about|what if)[^\n]*\?[*_ \t]*\s*\z"
    ))
    .expect("follow-up numbered pattern is valid")
});

static FOLLOW_UP_HEADED_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\n[ \t]*(?:#{1,6}[ \t]*)?(?:[*_]{1,2})?(?:follow[- ]up questions|related questions|further questions|questions you might (?:ask|have)|you (?:might|may) also (?:ask|want to know))(?:[*_]{1,2})?:?(?:[*_]{1,2})?[ \t]*(?:\n[ \t]*(?:[-*•+]|\d+[.)])[ \t]+[^\n]*)+\s*\z",
    )
    .expect("follow-up list pattern is valid")
});

static FOLLOW_UP_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)([.!])[ \t]+(?:{FOLLOW_UP_OPENERS})[^\n]*\?[ \t]*\z"
    ))
    .expect("inline follow-up pattern is valid")
});

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n(?:[ \t]*\n){3,}").expect("newline pattern is valid")
});

static TRAILING_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*\s*\z").expect("separator pattern is valid")
});

static FOREIGN_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[\p{Cyrillic}\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}\p{Arabic}\p{Devanagari}][\p{Cyrillic}\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}\p{Arabic}\p{Devanagari}\u{3000}-\u{303F}\u{FF00}-\u{FFEF}]*",
    )
    .expect("foreign script pattern is valid")
});

static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\)|\[\s*\]").expect("bracket pattern is valid"));

static MULTI_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("space pattern is valid"));

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.;:!?])").expect("punctuation pattern is valid"));

fn is_fence_line(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Apply `pattern` with `replacement` until the text stops changing.
/// A replacement that would leave only whitespace is refused.
fn strip_repeatedly(text: &str, pattern: &Regex, replacement: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = pattern.replace(&current, replacement).into_owned();
        if next == current || next.trim().is_empty() {
            return current;
        }
        current = next;
    }
}

/// Step 1
pub fn strip_leading_filler(text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_FILLER_PASSES {
        let next = LEADING_FILLER.replace(&current, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Step 2
pub fn strip_trailing_closers(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let lines_stripped = strip_repeatedly(&current, &CLOSER_LINE, "");
        let next = strip_repeatedly(&lines_stripped, &CLOSER_SENTENCE, "$1");
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Step 3
pub fn strip_follow_up_questions(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = strip_repeatedly(&current, &FOLLOW_UP_HEADED_LIST, "");
        next = strip_repeatedly(&next, &FOLLOW_UP_BULLET, "");
        next = strip_repeatedly(&next, &FOLLOW_UP_NUMBERED, "");
        next = strip_repeatedly(&next, &FOLLOW_UP_LINE, "");
        next = strip_repeatedly(&next, &FOLLOW_UP_INLINE, "$1");
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Step 4
pub fn tag_untagged_fences(text: &str) -> String {
    let mut in_fence = false;
    text.split('\n')
        .map(|line| {
            if !is_fence_line(line) {
                return line.to_string();
            }
            let opening = !in_fence;
            in_fence = !in_fence;

            let indent = line.len() - line.trim_start().len();
            let info = line.trim_start()["```".len()..].trim();
            if opening && info.is_empty() {
                format!("{}```{DEFAULT_FENCE_LANGUAGE}", &line[..indent])
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Step 5
pub fn collapse_blank_lines(text: &str) -> String {
    EXCESS_NEWLINES.replace_all(text, "\n\n\n").into_owned()
}

/// Step 6
pub fn capitalize_first(text: &str) -> String {
    let Some((index, first)) = text.char_indices().find(|(_, c)| !c.is_whitespace()) else {
        return text.to_string();
    };
    if !first.is_lowercase() {
        return text.to_string();
    }

    let mut capitalized = String::with_capacity(text.len() + 2);
    capitalized.push_str(&text[..index]);
    capitalized.extend(first.to_uppercase());
    capitalized.push_str(&text[index + first.len_utf8()..]);
    capitalized
}

/// Step 7
pub fn strip_trailing_separator(text: &str) -> String {
    strip_repeatedly(text, &TRAILING_SEPARATOR, "")
}

struct Paragraph {
    text: String,
    fenced: bool,
}

/// Split on blank lines outside code fences; fenced blocks stay whole
fn paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut fenced = false;
    let mut in_fence = false;

    for line in text.split('\n') {
        if is_fence_line(line) {
            in_fence = !in_fence;
            fenced = true;
            current.push(line);
        } else if !in_fence && line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(Paragraph {
                    text: current.join("\n"),
                    fenced,
                });
                current.clear();
                fenced = false;
            }
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        paragraphs.push(Paragraph {
            text: current.join("\n"),
            fenced,
        });
    }
    paragraphs
}

fn dedup_key(paragraph: &str) -> Option<String> {
    let normalized = paragraph
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.chars().count() < DEDUP_MIN_CHARS {
        return None;
    }
    Some(normalized.chars().take(DEDUP_KEY_CHARS).collect())
}

/// Step 8
///
/// Text is returned untouched when nothing repeats. Coding answers never
/// lose fenced paragraphs, since repeated code can be intentional.
pub fn dedup_paragraphs(text: &str, intent: Intent) -> String {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = false;

    for paragraph in paragraphs(text) {
        if intent == Intent::Coding && paragraph.fenced {
            kept.push(paragraph.text);
            continue;
        }
        let Some(key) = dedup_key(&paragraph.text) else {
            kept.push(paragraph.text);
            continue;
        };
        if seen.insert(key) {
            kept.push(paragraph.text);
        } else {
            dropped = true;
        }
    }

    if dropped {
        kept.join("\n\n")
    } else {
        text.to_string()
    }
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (c.is_alphabetic() && ('\u{C0}'..='\u{24F}').contains(&c))
}

fn clean_line(line: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, body) = line.split_at(indent_len);
    let body = EMPTY_BRACKETS.replace_all(body, "");
    let body = MULTI_SPACE.replace_all(&body, " ");
    let body = SPACE_BEFORE_PUNCT.replace_all(&body, "$1");
    format!("{indent}{}", body.trim_end())
}

/// Step 9
///
/// Only fires when Latin letters make up most of the prose outside code
/// fences; genuinely non-Latin answers are left alone.
pub fn strip_foreign_scripts(text: &str) -> String {
    let mut latin = 0usize;
    let mut foreign = 0usize;
    let mut in_fence = false;

    for line in text.split('\n') {
        if is_fence_line(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        latin += line.chars().filter(|c| is_latin_letter(*c)).count();
        foreign += FOREIGN_RUN
            .find_iter(line)
            .map(|m| m.as_str().chars().count())
            .sum::<usize>();
    }

    if foreign == 0 || (latin as f64) < LATIN_DOMINANCE * (latin + foreign) as f64 {
        return text.to_string();
    }

    let mut in_fence = false;
    text.split('\n')
        .map(|line| {
            if is_fence_line(line) {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence || !FOREIGN_RUN.is_match(line) {
                return line.to_string();
            }
            clean_line(&FOREIGN_RUN.replace_all(line, ""))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_pipeline(text: &str, intent: Intent) -> String {
    let text = strip_leading_filler(text);
    let text = strip_trailing_closers(&text);
    let text = strip_follow_up_questions(&text);
    let text = tag_untagged_fences(&text);
    let text = collapse_blank_lines(&text);
    let text = capitalize_first(&text);
    let text = strip_trailing_separator(&text);
    let text = dedup_paragraphs(&text, intent);
    let text = strip_foreign_scripts(&text);
    text.trim().to_string()
}

/// Clean a finished response
///
/// Runs the pipeline to a fixpoint, capped at `MAX_PIPELINE_PASSES`.
pub fn post_process(raw: &str, intent: Intent) -> String {
    let mut text = raw.to_string();
    for _ in 0..MAX_PIPELINE_PASSES {
        let next = run_pipeline(&text, intent);
        if next == text {
            break;
        }
        text = next;
    }
    text
}
