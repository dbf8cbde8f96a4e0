use ahash::AHashSet;

/// Lexer settings shared by the full-text builders and query normalization
#[derive(Debug, Clone)]
pub struct Lexer {
    case_sensitive: bool,
    max_len: usize,
    stopwords: AHashSet<Vec<u8>>,
}

/// A token produced by [`Lexer::tokens`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexToken<'a> {
    /// Ordinal of the token inside its text, counting skipped tokens too
    pub pos: u32,
    pub bytes: std::borrow::Cow<'a, [u8]>,
}

impl Lexer {
    pub fn new(case_sensitive: bool, max_len: usize, stopwords: &[String]) -> Self {
        let stopwords = stopwords
            .iter()
            .map(|w| {
                if case_sensitive {
                    w.as_bytes().to_vec()
                } else {
                    w.as_bytes().to_ascii_lowercase()
                }
            })
            .collect();
        Self {
            case_sensitive,
            max_len,
            stopwords,
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }

    /// Split `text` into indexable tokens.
    ///
    /// Tokens are maximal runs of ASCII alphanumerics and non-ASCII bytes, so
    /// multi-byte UTF-8 letters stay inside their word. Stopwords and tokens
    /// longer than the maximum length still consume a position.
    pub fn tokens<'a>(&self, text: &'a [u8]) -> Vec<LexToken<'a>> {
        let mut tokens = Vec::with_capacity(text.len() / 6 + 1);
        let mut token_start: Option<usize> = None;
        let mut pos = 0u32;

        for (i, &byte) in text.iter().enumerate() {
            if is_token_byte(byte) {
                if token_start.is_none() {
                    token_start = Some(i);
                }
            } else if let Some(start) = token_start.take() {
                self.emit(&text[start..i], pos, &mut tokens);
                pos += 1;
            }
        }
        if let Some(start) = token_start {
            self.emit(&text[start..], pos, &mut tokens);
        }

        tokens
    }

    fn emit<'a>(&self, slice: &'a [u8], pos: u32, tokens: &mut Vec<LexToken<'a>>) {
        if slice.len() > self.max_len {
            return;
        }
        let bytes = self.normalize(slice);
        if self.stopwords.contains(bytes.as_ref()) {
            return;
        }
        tokens.push(LexToken { pos, bytes });
    }

    /// Apply case folding to a query token the same way indexed tokens were folded
    pub fn normalize<'a>(&self, token: &'a [u8]) -> std::borrow::Cow<'a, [u8]> {
        if self.case_sensitive || !token.iter().any(u8::is_ascii_uppercase) {
            std::borrow::Cow::Borrowed(token)
        } else {
            std::borrow::Cow::Owned(token.to_ascii_lowercase())
        }
    }
}

#[inline]
fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(lexer: &Lexer, text: &str) -> Vec<(u32, String)> {
        lexer
            .tokens(text.as_bytes())
            .into_iter()
            .map(|t| (t.pos, String::from_utf8(t.bytes.into_owned()).unwrap()))
            .collect()
    }

    #[test]
    fn test_split_and_fold() {
        let lexer = Lexer::new(false, 96, &[]);
        assert_eq!(
            words(&lexer, "The quick, brown-Fox!"),
            vec![
                (0, "the".to_string()),
                (1, "quick".to_string()),
                (2, "brown".to_string()),
                (3, "fox".to_string()),
            ]
        );
    }

    #[test]
    fn test_case_sensitive() {
        let lexer = Lexer::new(true, 96, &[]);
        let tokens = words(&lexer, "Hello World");
        assert_eq!(tokens[0].1, "Hello");
        assert_eq!(lexer.normalize(b"ABC").as_ref(), b"ABC");
    }

    #[test]
    fn test_stopwords_keep_positions() {
        let lexer = Lexer::new(false, 96, &["the".to_string(), "A".to_string()]);
        assert_eq!(
            words(&lexer, "the cat and a dog"),
            vec![
                (1, "cat".to_string()),
                (2, "and".to_string()),
                (4, "dog".to_string()),
            ]
        );
    }

    #[test]
    fn test_long_tokens_skipped() {
        let lexer = Lexer::new(false, 4, &[]);
        assert_eq!(
            words(&lexer, "tiny enormous cat"),
            vec![(0, "tiny".to_string()), (2, "cat".to_string())]
        );
    }

    #[test]
    fn test_utf8_letters_stay_in_token() {
        let lexer = Lexer::new(false, 96, &[]);
        let tokens = words(&lexer, "Grüße aus Köln");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].1, "grüße");
        assert_eq!(tokens[2].1, "köln");
    }
}
