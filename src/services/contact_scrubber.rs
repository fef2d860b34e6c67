//! Contact detail redaction for public views.

use regex::{Captures, Regex};
use std::fmt;

/// Phone-shaped matches with fewer digits than this are left alone, so
/// year ranges and dates survive.
const MIN_PHONE_DIGITS: usize = 9;

/// Best-effort redaction of email- and phone-shaped substrings in free text.
#[derive(Clone)]
pub struct ContactScrubber {
    email_pattern: Regex,
    phone_pattern: Regex,
}

impl ContactScrubber {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            email_pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            // Optional +, then digits with common separators
            phone_pattern: Regex::new(r"\+?\(?\d[\d\s().-]{6,}\d")?,
        })
    }

    /// Scrub a text of contact details
    pub fn scrub(&self, text: &str) -> String {
        let scrubbed = self.email_pattern.replace_all(text, "[email hidden]");
        self.phone_pattern
            .replace_all(&scrubbed, |caps: &Captures| {
                let candidate = &caps[0];
                if candidate.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS {
                    "[phone hidden]".to_string()
                } else {
                    candidate.to_string()
                }
            })
            .into_owned()
    }

    pub fn contains_contact(&self, text: &str) -> bool {
        self.scrub(text) != text
    }
}

impl fmt::Debug for ContactScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactScrubber").finish()
    }
}
