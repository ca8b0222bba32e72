//! Intent classification
//!
//! Deterministic, no I/O. The classifier walks an ordered table of
//! [`Rule`]s and returns the intent of the first rule whose predicate
//! matches. Lower rules are never consulted once a higher rule matched, so
//! the order of [`RULES`] is part of the contract:
//!
//! 1. product / shopping → `live`
//! 2. image attachment, live or time-sensitive facts → `live`
//! 3. lightweight comparison that is not a code request → `general`
//! 4. strong technical vocabulary, code fences, stack traces → `coding`
//! 5. two weak code markers, or one plus an imperative opener → `coding`
//! 6. analytical markers → `reasoning`
//! 7. factual-depth markers → `research`
//! 8. long questions or attached documents → `reasoning`
//!
//! Anything else is `general`. [`Intent::Math`] has no rule.

use super::Intent;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Build a case-insensitive alternation with word boundaries where the term
/// edges are word characters (so `c++` and `node.js` still match).
fn vocabulary(terms: &[&str]) -> Regex {
    let alternation = terms
        .iter()
        .map(|term| {
            let starts_word = term.chars().next().is_some_and(is_word_char);
            let ends_word = term.chars().last().is_some_and(is_word_char);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(term),
                if ends_word { r"\b" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{alternation})")).expect("vocabulary terms are escaped")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

static PRODUCT_SIGNALS: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "buy",
        "buying",
        "purchase",
        "price of",
        "prices of",
        "price for",
        "deals on",
        "deal on",
        "best deal",
        "cheapest",
        "discount on",
        "coupon",
        "for sale",
        "where to buy",
        "shopping",
        "in stock",
    ])
});

static BUDGET_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bunder\s+(?:\$|₹|€|£)\s?\d").expect("static pattern")
});

static MARKETPLACES: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "amazon",
        "ebay",
        "walmart",
        "flipkart",
        "best buy",
        "aliexpress",
        "etsy",
        "costco",
        "newegg",
        "target.com",
    ])
});

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:vs\.?|versus|compare|compared|comparing|comparison)(?:\b|\s|$)|\bwhich (?:one )?is better\b",
    )
    .expect("static pattern")
});

/// Software vocabulary that disqualifies a comparison from being a product lookup
static TECH_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "software",
        "programming",
        "code",
        "function",
        "functions",
        "framework",
        "frameworks",
        "library",
        "libraries",
        "api",
        "apis",
        "sdk",
        "sdks",
        "database",
        "databases",
        "language",
        "languages",
        "backend",
        "frontend",
        "server",
        "servers",
        "cloud",
        "algorithm",
        "algorithms",
        "python",
        "javascript",
        "typescript",
        "rust",
        "golang",
        "java",
        "kotlin",
        "c++",
        "c#",
        "ruby",
        "php",
        "react",
        "vue",
        "angular",
        "svelte",
        "django",
        "flask",
        "rails",
        "spring",
        "node.js",
        "nodejs",
        "postgres",
        "postgresql",
        "mysql",
        "mongodb",
        "redis",
        "aws",
        "azure",
        "gcp",
        "docker",
        "kubernetes",
    ])
});

static LIVE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "weather",
        "forecast",
        "stock price",
        "share price",
        "who won",
        "breaking",
        "live score",
        "exchange rate",
        "headlines",
    ])
});

static TIME_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "today",
        "tonight",
        "yesterday",
        "current",
        "currently",
        "latest",
        "right now",
    ])
});

static FACTUAL_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "news", "price", "prices", "score", "scores", "weather", "who", "status",
    ])
});

static CODE_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:debug|debugging|bug|error|exception|stack ?trace|traceback|refactor|compile|implement|fix (?:my|this|the) code|write (?:a|an|the|some|me a) (?:function|script|program|class|method|query))\b",
    )
    .expect("static pattern")
});

static STRONG_CODING: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "function",
        "functions",
        "debug",
        "debugging",
        "stack trace",
        "stack traces",
        "stacktrace",
        "traceback",
        "segfault",
        "segmentation fault",
        "null pointer",
        "syntax error",
        "compile error",
        "compiler error",
        "kubernetes",
        "k8s",
        "docker",
        "dockerfile",
        "pip install",
        "npm",
        "python",
        "javascript",
        "typescript",
        "rust",
        "golang",
        "java",
        "kotlin",
        "c++",
        "c#",
        "ruby",
        "php",
        "scala",
        "haskell",
        "sql",
        "html",
        "css",
        "bash",
        "react",
        "vue",
        "angular",
        "svelte",
        "django",
        "flask",
        "fastapi",
        "spring boot",
        "next.js",
        "nextjs",
        "node.js",
        "nodejs",
        "express.js",
        "tensorflow",
        "pytorch",
        "pandas",
        "numpy",
    ])
});

/// Lines that look like a runtime stack trace (JS, Python, JVM)
static STACK_TRACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)(?:^\s+at \S+.*:\d+(?::\d+)?\)?\s*$|File "[^"]+", line \d+|Traceback \(most recent call last\))"#,
    )
    .expect("static pattern")
});

static WEAK_CODING: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "code",
        "script",
        "scripts",
        "commit",
        "commits",
        "class",
        "classes",
        "loop",
        "loops",
        "variable",
        "variables",
        "array",
        "arrays",
        "api",
        "endpoint",
        "endpoints",
        "query",
        "queries",
        "deploy",
        "repository",
        "repo",
        "git",
        "regex",
        "algorithm",
        "method",
        "module",
        "library",
        "package",
        "install",
        "terminal",
        "command line",
        "server",
        "database",
        "json",
        "yaml",
        "compile",
        "syntax",
        "runtime",
        "framework",
        "branch",
        "merge",
    ])
});

static IMPERATIVE_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:how (?:to|do i|can i|would i|should i)|write (?:a|an|me|the|some)|create (?:a|an|the)|build (?:a|an|the)|generate (?:a|an|the)|make (?:a|an)|implement)\b",
    )
    .expect("static pattern")
});

static REASONING_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "analyze",
        "analyse",
        "analysis",
        "trade-off",
        "trade-offs",
        "tradeoff",
        "tradeoffs",
        "pros and cons",
        "should i",
        "critique",
        "audit",
        "evaluate",
        "assess",
        "implications",
        "step by step",
        "think through",
        "reason through",
        "justify",
        "decide between",
    ])
});

static RESEARCH_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    vocabulary(&[
        "research",
        "study",
        "studies",
        "history of",
        "difference between",
        "differences between",
        "statistics on",
        "statistics about",
        "statistics for",
        "evidence for",
        "evidence that",
        "origin of",
        "origins of",
        "timeline of",
        "overview of",
        "literature",
        "peer-reviewed",
    ])
});

static QUESTION_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:what|why|how|when|where|who|which|can|could|should|would|is|are|do|does)\b",
    )
    .expect("static pattern")
});

/// Prompts longer than this many words that are questions fall back to reasoning
pub const LONG_QUESTION_WORDS: usize = 50;

/// Precomputed features shared by every rule predicate
#[derive(Debug, Clone)]
pub struct Signals<'a> {
    pub prompt: &'a str,
    pub word_count: usize,
    pub has_image: bool,
    pub has_docs: bool,
}

impl<'a> Signals<'a> {
    pub fn new(prompt: &'a str, has_image: bool, has_docs: bool) -> Self {
        Self {
            prompt,
            word_count: prompt.split_whitespace().count(),
            has_image,
            has_docs,
        }
    }

    fn has_code_fence(&self) -> bool {
        self.prompt.contains("```")
    }

    fn is_comparison(&self) -> bool {
        COMPARISON.is_match(self.prompt)
    }

    fn is_question(&self) -> bool {
        self.prompt.contains('?') || QUESTION_OPENER.is_match(self.prompt)
    }
}

/// One entry of the ordered classification table
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub intent: Intent,
    /// Confidence reported when this rule decides the intent
    pub confidence: f64,
    pub matches: fn(&Signals<'_>) -> bool,
}

/// Classification table, evaluated top to bottom, first match wins
pub static RULES: &[Rule] = &[
    Rule {
        name: "product",
        intent: Intent::Live,
        confidence: 0.9,
        matches: product_rule,
    },
    Rule {
        name: "image",
        intent: Intent::Live,
        confidence: 0.85,
        matches: image_rule,
    },
    Rule {
        name: "live",
        intent: Intent::Live,
        confidence: 0.9,
        matches: live_rule,
    },
    Rule {
        name: "comparison",
        intent: Intent::General,
        confidence: 0.7,
        matches: comparison_rule,
    },
    Rule {
        name: "coding_strong",
        intent: Intent::Coding,
        confidence: 0.9,
        matches: strong_coding_rule,
    },
    Rule {
        name: "coding_contextual",
        intent: Intent::Coding,
        confidence: 0.75,
        matches: contextual_coding_rule,
    },
    Rule {
        name: "reasoning",
        intent: Intent::Reasoning,
        confidence: 0.8,
        matches: reasoning_rule,
    },
    Rule {
        name: "research",
        intent: Intent::Research,
        confidence: 0.8,
        matches: research_rule,
    },
    Rule {
        name: "complexity_fallback",
        intent: Intent::Reasoning,
        confidence: 0.6,
        matches: complexity_fallback_rule,
    },
];

/// Name and confidence reported when no rule matched
pub const DEFAULT_RULE: &str = "default";
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Narrow product detector: explicit shopping language or a marketplace name
///
/// Used on its own by the instruction assembler, which only adds shopping
/// guidance for real product lookups (not every `live` request).
pub fn is_product_query(prompt: &str) -> bool {
    PRODUCT_SIGNALS.is_match(prompt)
        || BUDGET_PHRASE.is_match(prompt)
        || MARKETPLACES.is_match(prompt)
}

pub fn product_rule(signals: &Signals<'_>) -> bool {
    is_product_query(signals.prompt)
        || (signals.is_comparison() && !TECH_VOCABULARY.is_match(signals.prompt))
}

pub fn image_rule(signals: &Signals<'_>) -> bool {
    signals.has_image
}

pub fn live_rule(signals: &Signals<'_>) -> bool {
    LIVE_MARKERS.is_match(signals.prompt)
        || (TIME_CONTEXT.is_match(signals.prompt) && FACTUAL_QUERY.is_match(signals.prompt))
}

/// Comparison questions stay lightweight unless they are code requests
pub fn comparison_rule(signals: &Signals<'_>) -> bool {
    signals.is_comparison() && !signals.has_code_fence() && !CODE_REQUEST.is_match(signals.prompt)
}

pub fn strong_coding_rule(signals: &Signals<'_>) -> bool {
    signals.has_code_fence()
        || STACK_TRACE.is_match(signals.prompt)
        || STRONG_CODING.is_match(signals.prompt)
}

pub fn contextual_coding_rule(signals: &Signals<'_>) -> bool {
    let hits: HashSet<String> = WEAK_CODING
        .find_iter(signals.prompt)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    hits.len() >= 2 || (hits.len() == 1 && IMPERATIVE_OPENER.is_match(signals.prompt))
}

pub fn reasoning_rule(signals: &Signals<'_>) -> bool {
    REASONING_MARKERS.is_match(signals.prompt)
}

pub fn research_rule(signals: &Signals<'_>) -> bool {
    RESEARCH_MARKERS.is_match(signals.prompt)
}

pub fn complexity_fallback_rule(signals: &Signals<'_>) -> bool {
    (signals.word_count > LONG_QUESTION_WORDS && signals.is_question()) || signals.has_docs
}

/// Outcome of classification, including which rule decided it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub rule: &'static str,
    pub confidence: f64,
}

/// Classify a prompt and report the deciding rule
pub fn classify_detailed(prompt: &str, has_image: bool, has_docs: bool) -> Classification {
    let signals = Signals::new(prompt, has_image, has_docs);

    RULES
        .iter()
        .find(|rule| (rule.matches)(&signals))
        .map(|rule| Classification {
            intent: rule.intent,
            rule: rule.name,
            confidence: rule.confidence,
        })
        .unwrap_or(Classification {
            intent: Intent::General,
            rule: DEFAULT_RULE,
            confidence: DEFAULT_CONFIDENCE,
        })
}

/// Classify a prompt into exactly one [`Intent`]
pub fn classify(prompt: &str, has_image: bool, has_docs: bool) -> Intent {
    classify_detailed(prompt, has_image, has_docs).intent
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signals(prompt: &str) -> Signals<'_> {
        Signals::new(prompt, false, false)
    }

    #[test]
    fn test_rule_order_is_stable() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "product",
                "image",
                "live",
                "comparison",
                "coding_strong",
                "coding_contextual",
                "reasoning",
                "research",
                "complexity_fallback",
            ]
        );
    }

    // Rule: product
    #[test]
    fn test_product_rule_strong_signals() {
        assert!(product_rule(&signals("cheapest noise cancelling headphones")));
        assert!(product_rule(&signals("Where can I buy a standing desk")));
        assert!(product_rule(&signals("price of the new kindle")));
        assert!(product_rule(&signals("good running shoes under $100")));
        assert!(product_rule(&signals("is this blender on amazon")));
    }

    #[test]
    fn test_product_rule_comparison_without_tech() {
        assert!(product_rule(&signals("iphone 15 vs pixel 8")));
        assert!(!product_rule(&signals("react vs vue for a dashboard")));
        assert!(!product_rule(&signals("compare postgres and mysql")));
    }

    #[test]
    fn test_product_rule_word_boundaries() {
        // "buy" inside "buyer" or "buoy" must not fire
        assert!(!product_rule(&signals("the buoyancy of a ship")));
        assert!(!is_product_query("tell me about the buyers market concept"));
    }

    #[test]
    fn test_is_product_query_is_narrower_than_rule() {
        // Comparison alone routes live, but is not a product query
        assert!(product_rule(&signals("coke versus pepsi")));
        assert!(!is_product_query("coke versus pepsi"));
    }

    // Rule: image / live
    #[test]
    fn test_image_forces_live() {
        assert_eq!(classify("what is this?", true, false), Intent::Live);
        assert_eq!(classify("explain this function", true, false), Intent::Live);
    }

    #[test]
    fn test_live_rule_explicit_markers() {
        assert!(live_rule(&signals("weather in Paris")));
        assert!(live_rule(&signals("Who won the match last night")));
        assert!(live_rule(&signals("breaking: earthquake")));
    }

    #[test]
    fn test_live_rule_requires_time_and_factual_marker() {
        assert!(live_rule(&signals("latest news about the election")));
        assert!(live_rule(&signals("who is the current CEO of Intel")));
        // time word without factual marker
        assert!(!live_rule(&signals("how do I get the current directory")));
        // factual marker without time word
        assert!(!live_rule(&signals("who wrote hamlet")));
    }

    #[test]
    fn test_coding_prompts_with_time_words_stay_coding() {
        assert!(!live_rule(&signals("Now write a function that returns the result")));
        assert_eq!(
            classify("Now write a function that returns the result", false, false),
            Intent::Coding
        );
        assert_eq!(
            classify("How do I update the current branch in git?", false, false),
            Intent::Coding
        );
        assert!(live_rule(&signals("what's the weather like right now")));
    }

    // Rule: comparison guard
    #[test]
    fn test_comparison_guard_forces_general() {
        assert_eq!(classify("react vs vue", false, false), Intent::General);
        assert_eq!(
            classify("python versus javascript for beginners", false, false),
            Intent::General
        );
    }

    #[test]
    fn test_comparison_with_code_request_is_not_guarded() {
        assert!(!comparison_rule(&signals(
            "debug this: my react code throws an error vs the vue version"
        )));
        assert_eq!(
            classify(
                "debug this: my react code throws an error vs the vue version",
                false,
                false
            ),
            Intent::Coding
        );
    }

    // Rule: coding
    #[test]
    fn test_strong_coding_vocabulary() {
        assert!(strong_coding_rule(&signals("my kubernetes pod keeps restarting")));
        assert!(strong_coding_rule(&signals("what does this function return")));
        assert!(strong_coding_rule(&signals("fix this\n```\nlet x = 1;\n```")));
        assert!(strong_coding_rule(&signals("is c++ faster")));
    }

    #[test]
    fn test_plural_technical_nouns() {
        assert!(strong_coding_rule(&signals("my functions keep failing")));
        assert!(!product_rule(&signals("compare these two functions")));
        assert_eq!(
            classify("compare these two functions", false, false),
            Intent::General
        );
        assert!(contextual_coding_rule(&signals("my scripts share variables")));
    }

    #[test]
    fn test_strong_coding_stack_trace() {
        let python = "Traceback (most recent call last):\n  File \"app.py\", line 3, in <module>\n";
        let node = "TypeError: x is undefined\n    at main (/srv/app/index.js:10:5)\n";
        assert!(strong_coding_rule(&signals(python)));
        assert!(strong_coding_rule(&signals(node)));
    }

    #[test]
    fn test_contextual_coding_needs_two_hits_or_imperative() {
        assert!(contextual_coding_rule(&signals("my script has an infinite loop")));
        assert!(contextual_coding_rule(&signals("how to write a regex")));
        assert!(!contextual_coding_rule(&signals("what is a class")));
        // same marker twice counts once
        assert!(!contextual_coding_rule(&signals("class after class")));
    }

    // Rule: reasoning / research
    #[test]
    fn test_reasoning_markers() {
        assert_eq!(
            classify("pros and cons of remote work", false, false),
            Intent::Reasoning
        );
        assert_eq!(
            classify("Should I rent or buy a house", false, false),
            Intent::Live,
            "product language outranks reasoning markers"
        );
        assert_eq!(
            classify("critique my essay outline", false, false),
            Intent::Reasoning
        );
    }

    #[test]
    fn test_research_markers() {
        assert_eq!(
            classify("history of the printing press", false, false),
            Intent::Research
        );
        assert_eq!(
            classify("difference between a virus and bacteria", false, false),
            Intent::Research
        );
    }

    // Rule: complexity fallback
    #[test]
    fn test_long_question_falls_back_to_reasoning() {
        let long = format!("{} what happened next?", "word ".repeat(55));
        assert_eq!(classify(&long, false, false), Intent::Reasoning);
        let long_statement = "word ".repeat(60);
        assert_eq!(classify(&long_statement, false, false), Intent::General);
    }

    #[test]
    fn test_documents_fall_back_to_reasoning() {
        let result = classify_detailed("summarize this", false, true);
        assert_eq!(result.intent, Intent::Reasoning);
        assert_eq!(result.rule, "complexity_fallback");
    }

    #[test]
    fn test_default_is_general() {
        let result = classify_detailed("What is the capital of France?", false, false);
        assert_eq!(result.intent, Intent::General);
        assert_eq!(result.rule, DEFAULT_RULE);
        assert_eq!(result.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_product_outranks_coding() {
        let result = classify_detailed("buy a react component library", false, false);
        assert_eq!(result.intent, Intent::Live);
        assert_eq!(result.rule, "product");
    }

    #[test]
    fn test_math_is_never_produced() {
        // Math exists in the enum but no rule emits it
        assert!(RULES.iter().all(|rule| rule.intent != Intent::Math));
        for prompt in [
            "solve 2x + 3 = 7",
            "integrate x^2 dx",
            "what is 17 * 23",
            "prove that sqrt(2) is irrational",
        ] {
            assert_ne!(classify(prompt, false, false), Intent::Math, "{prompt}");
        }
    }

    proptest! {
        #[test]
        fn prop_classify_is_deterministic(
            prompt in "[a-zA-Z0-9 ?.,`\n]{0,200}",
            has_image in any::<bool>(),
            has_docs in any::<bool>(),
        ) {
            let first = classify_detailed(&prompt, has_image, has_docs);
            let second = classify_detailed(&prompt, has_image, has_docs);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_image_always_live(prompt in "[a-z ]{0,80}") {
            prop_assert_eq!(classify(&prompt, true, false), Intent::Live);
        }
    }
}
