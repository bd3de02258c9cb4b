//! Post-processing for generated and translated text.
//! Artifact stripping, word cap and sentence trim are transforms; the
//! readability gate and retry rule are decisions over their output.

use regex::Regex;

/// Sentence terminators across the supported scripts.
pub const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Terminator must sit at or past this fraction of the text to cut there.
const SENTENCE_CUT_RATIO: f64 = 0.55;

const RETRY_MIN_WORDS: usize = 120;

const MIN_READABLE_WORDS: usize = 45;
const MIN_LETTER_RATIO: f64 = 0.55;
const MAX_DIGIT_RATIO: f64 = 0.12;
const MIN_AVG_WORD_LEN: f64 = 2.8;
const MAX_AVG_WORD_LEN: f64 = 11.5;

pub struct Sanitizer {
    labels: Vec<String>,
    max_words: usize,
    heading: Regex,
    bullet: Regex,
    hashes: Regex,
    whitespace: Regex,
}

impl Sanitizer {
    /// `labels` are prompt labels the model may echo back.
    pub fn new(labels: Vec<String>, max_words: usize) -> Self {
        let mut labels: Vec<String> = labels.into_iter().filter(|l| !l.is_empty()).collect();
        // Longer labels first so a label containing another is removed whole.
        labels.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
        Self {
            labels,
            max_words,
            heading: Regex::new(r"^\s*#{1,6}\s*").expect("static pattern"),
            bullet: Regex::new(r"^\s*[-*•]\s+").expect("static pattern"),
            hashes: Regex::new(r"#{2,}").expect("static pattern"),
            whitespace: Regex::new(r"\s+").expect("static pattern"),
        }
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Remove markdown and label artifacts and fold the text into a single
    /// whitespace-normalized paragraph.
    pub fn strip_artifacts(&self, text: &str) -> String {
        let mut value = text
            .replace('\r', " ")
            .replace('\t', " ")
            .replace("**", "")
            .replace("__", "");
        for label in &self.labels {
            value = value.replace(label.as_str(), "");
        }

        let joined = value
            .lines()
            .map(|line| {
                let line = self.heading.replace(line, "");
                let line = self.bullet.replace(&line, "");
                let line = self.hashes.replace_all(&line, "");
                line.replace('*', "").trim().to_string()
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        self.whitespace.replace_all(&joined, " ").trim().to_string()
    }

    /// strip → word cap → sentence trim.
    pub fn finalize(&self, text: &str) -> String {
        let stripped = self.strip_artifacts(text);
        let capped = cap_words(&stripped, self.max_words);
        trim_to_sentence(&capped)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep at most `max_words` whitespace-delimited words.
pub fn cap_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > max_words {
        words[..max_words].join(" ")
    } else {
        text.to_string()
    }
}

/// Cut after the last terminator when it lies in the final 45% of the
/// text; otherwise close a text ending on a letter with a period.
pub fn trim_to_sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if let Some(idx) = chars.iter().rposition(|c| SENTENCE_TERMINATORS.contains(c)) {
        if idx as f64 / chars.len() as f64 >= SENTENCE_CUT_RATIO {
            return chars[..=idx].iter().collect::<String>().trim().to_string();
        }
    }

    match chars.last() {
        Some(c) if c.is_alphabetic() => format!("{trimmed}."),
        _ => trimmed.to_string(),
    }
}

pub fn ends_with_terminator(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .is_some_and(|c| SENTENCE_TERMINATORS.contains(&c))
}

/// Retry when the attempt is short or stops mid-sentence.
pub fn should_retry(text: &str) -> bool {
    word_count(text) < RETRY_MIN_WORDS || !ends_with_terminator(text)
}

/// Heuristic quality gate. Rejected text must never reach the user.
pub fn is_readable(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < MIN_READABLE_WORDS {
        return false;
    }

    let total = trimmed.chars().count().max(1) as f64;
    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count() as f64;
    let digits = trimmed.chars().filter(|c| c.is_numeric()).count() as f64;
    let avg_word_len =
        words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / words.len() as f64;
    let has_punctuation = trimmed.contains('.') || trimmed.contains(',');

    letters / total >= MIN_LETTER_RATIO
        && digits / total <= MAX_DIGIT_RATIO
        && (MIN_AVG_WORD_LEN..=MAX_AVG_WORD_LEN).contains(&avg_word_len)
        && has_punctuation
}

/// One finalized generation result and the measures the retry rule reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAttempt {
    pub text: String,
    pub word_count: usize,
    pub terminated: bool,
}

impl GenerationAttempt {
    pub fn new(text: String) -> Self {
        Self {
            word_count: word_count(&text),
            terminated: ends_with_terminator(&text),
            text,
        }
    }

    pub fn needs_retry(&self) -> bool {
        self.word_count < RETRY_MIN_WORDS || !self.terminated
    }

    /// The retry wins unless it has strictly fewer words.
    pub fn prefer(self, retry: GenerationAttempt) -> GenerationAttempt {
        if retry.word_count >= self.word_count {
            retry
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTENCE: &str = "You will find steady progress at work this week, and a calm conversation helps you settle an old question.";

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(
            vec!["Horoscope:".into(), "Horóscopo:".into(), "运势：".into()],
            200,
        )
    }

    fn words(n: usize) -> String {
        let base: Vec<&str> = SENTENCE.split_whitespace().collect();
        (0..n).map(|i| base[i % base.len()]).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn strips_markdown_bullets_and_labels() {
        let raw = "**Horoscope:**\n\n- Work: stay focused.\n* Love:  be kind.\r\n## Money\tsave more.";
        assert_eq!(
            sanitizer().strip_artifacts(raw),
            "Work: stay focused. Love: be kind. Money save more."
        );
    }

    #[test]
    fn strips_localized_labels_anywhere() {
        let s = sanitizer();
        assert_eq!(s.strip_artifacts("Horóscopo: Semana tranquila."), "Semana tranquila.");
        assert_eq!(s.strip_artifacts("运势：本周顺利。"), "本周顺利。");
    }

    #[test]
    fn caps_word_count() {
        let text = words(250);
        assert_eq!(word_count(&cap_words(&text, 200)), 200);
        assert_eq!(cap_words("a b c", 200), "a b c");
    }

    #[test]
    fn trims_at_late_terminator() {
        let head = "x".repeat(89);
        let text = format!("{head}. tail end");
        assert_eq!(trim_to_sentence(&text), format!("{head}."));
    }

    #[test]
    fn early_terminator_appends_period_instead() {
        let text = format!("{}. {}", "x".repeat(19), "y".repeat(79));
        assert_eq!(trim_to_sentence(&text), format!("{text}."));
    }

    #[test]
    fn early_terminator_and_non_letter_ending_is_unchanged() {
        let text = format!("{}. {} 42", "x".repeat(19), "y".repeat(76));
        assert_eq!(trim_to_sentence(&text), text);
    }

    #[test]
    fn cjk_terminators_count() {
        assert_eq!(trim_to_sentence("这是一个很长的句子已经结束。尾"), "这是一个很长的句子已经结束。");
    }

    #[test]
    fn retry_rule() {
        let short = format!("{}.", words(80));
        assert!(should_retry(&short));

        let long = format!("{}.", words(150));
        assert!(!should_retry(&long));

        let cut = words(150);
        assert!(should_retry(&cut));

        assert!(should_retry(""));
    }

    #[test]
    fn attempt_matches_retry_rule_and_prefers_retry_on_ties() {
        let first = GenerationAttempt::new(format!("{}.", words(80)));
        assert!(first.needs_retry());
        let same = GenerationAttempt::new(format!("{}!", words(80)));
        assert_eq!(first.clone().prefer(same.clone()), same);
        let worse = GenerationAttempt::new(format!("{}.", words(60)));
        assert_eq!(first.clone().prefer(worse), first);
    }

    #[test]
    fn readability_gate() {
        assert!(!is_readable(&format!("{}.", words(10))));

        let natural = [SENTENCE; 4].join(" ");
        assert!(word_count(&natural) >= 60);
        assert!(is_readable(&natural));

        let digits = vec!["1234, 5678"; 30].join(" ");
        assert!(!is_readable(&digits));

        let unpunctuated = vec!["steady progress"; 30].join(" ");
        assert!(!is_readable(&unpunctuated));

        let long_tokens = format!("{}.", vec!["abcdefghijklmnop"; 50].join(" "));
        assert!(!is_readable(&long_tokens));
    }

    #[test]
    fn finalize_composes_all_steps() {
        let raw = format!("Horoscope:\n{}", words(230));
        let out = sanitizer().finalize(&raw);
        assert!(word_count(&out) <= 200);
        assert!(!out.contains("Horoscope:"));
        assert!(ends_with_terminator(&out));
    }
}
