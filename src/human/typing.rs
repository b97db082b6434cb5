//! Keystroke planning with human cadence and self-corrected typos.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::time::Duration;

use super::timing::{uniform_ms, SessionVariation};

const THINKING_PAUSE_PROBABILITY: f64 = 0.08;
const THINKING_PAUSE_MS: (u64, u64) = (800, 2800);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypingOptions {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub typo_chance: f64,
}

impl Default for TypingOptions {
    fn default() -> Self {
        Self {
            min_delay_ms: 60,
            max_delay_ms: 180,
            typo_chance: 0.05,
        }
    }
}

impl TypingOptions {
    pub fn without_typos(mut self) -> Self {
        self.typo_chance = 0.0;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Type(char),
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keystroke {
    pub action: KeyAction,
    /// Wait after the key.
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypoKind {
    DoubleType,
    AdjacentKey,
    RandomLetter,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeystrokePlan {
    pub strokes: Vec<Keystroke>,
    pub typo_count: usize,
}

impl KeystrokePlan {
    /// The text left in a field after performing every stroke in order.
    pub fn replay(&self) -> String {
        let mut out = String::new();
        for stroke in &self.strokes {
            match stroke.action {
                KeyAction::Type(c) => out.push(c),
                KeyAction::Backspace => {
                    out.pop();
                }
            }
        }
        out
    }

    pub fn backspace_count(&self) -> usize {
        self.strokes
            .iter()
            .filter(|s| s.action == KeyAction::Backspace)
            .count()
    }

    pub fn total_delay(&self) -> Duration {
        self.strokes.iter().map(|s| s.delay).sum()
    }
}

/// Build the keystroke sequence for `text`.
pub fn plan_keystrokes(
    rng: &mut StdRng,
    text: &str,
    options: &TypingOptions,
    variation: &SessionVariation,
) -> KeystrokePlan {
    let mut plan = KeystrokePlan::default();
    let speed = variation.typing_speed_multiplier;
    let key_delay = |rng: &mut StdRng| -> Duration {
        uniform_ms(rng, options.min_delay_ms, options.max_delay_ms).mul_f64(speed)
    };

    for (index, c) in text.chars().enumerate() {
        if !c.is_whitespace() && options.typo_chance > 0.0 {
            let chance = options.typo_chance * (1.0 + rng.random::<f64>() * 0.5);
            if rng.random_bool(chance.min(1.0)) {
                let kind = match rng.random_range(0..3) {
                    0 => TypoKind::DoubleType,
                    1 => TypoKind::AdjacentKey,
                    _ => TypoKind::RandomLetter,
                };
                push_typo(rng, &mut plan, c, kind, &key_delay);
                plan.typo_count += 1;
                if kind == TypoKind::DoubleType {
                    continue;
                }
            }
        }

        let mut delay = key_delay(rng);
        if c == ' ' {
            delay = delay.mul_f64(1.5);
        } else if matches!(c, '.' | '!' | '?') {
            delay = delay.mul_f64(2.0);
        }
        if index == 0 {
            delay = delay.mul_f64(1.3);
        }
        if rng.random_bool(THINKING_PAUSE_PROBABILITY) {
            delay += uniform_ms(rng, THINKING_PAUSE_MS.0, THINKING_PAUSE_MS.1);
        }
        plan.strokes.push(Keystroke {
            action: KeyAction::Type(c),
            delay,
        });
    }
    plan
}

/// Every typo leaves exactly one backspace in the plan. A double-type ends
/// with the intended character already in place; the substitution kinds
/// leave the correct character to the caller.
fn push_typo(
    rng: &mut StdRng,
    plan: &mut KeystrokePlan,
    intended: char,
    kind: TypoKind,
    key_delay: &dyn Fn(&mut StdRng) -> Duration,
) {
    let noticed = |rng: &mut StdRng| key_delay(rng).mul_f64(2.0);
    match kind {
        TypoKind::DoubleType => {
            plan.strokes.push(Keystroke { action: KeyAction::Type(intended), delay: key_delay(rng) });
            plan.strokes.push(Keystroke { action: KeyAction::Type(intended), delay: noticed(rng) });
            plan.strokes.push(Keystroke { action: KeyAction::Backspace, delay: key_delay(rng) });
        }
        TypoKind::AdjacentKey | TypoKind::RandomLetter => {
            let wrong = if kind == TypoKind::AdjacentKey {
                adjacent_key(rng, intended).unwrap_or_else(|| random_letter(rng, intended))
            } else {
                random_letter(rng, intended)
            };
            plan.strokes.push(Keystroke { action: KeyAction::Type(wrong), delay: noticed(rng) });
            plan.strokes.push(Keystroke { action: KeyAction::Backspace, delay: key_delay(rng) });
        }
    }
}

const QWERTY_ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];

fn qwerty_neighbours(c: char) -> Vec<char> {
    let lower = c.to_ascii_lowercase();
    let Some((row, col)) = QWERTY_ROWS
        .iter()
        .enumerate()
        .find_map(|(r, keys)| keys.find(lower).map(|col| (r, col)))
    else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for r in row.saturating_sub(1)..=(row + 1).min(QWERTY_ROWS.len() - 1) {
        let keys = QWERTY_ROWS[r].as_bytes();
        for k in col.saturating_sub(1)..=col + 1 {
            if let Some(&b) = keys.get(k) {
                let ch = b as char;
                if ch != lower {
                    out.push(ch);
                }
            }
        }
    }
    out
}

fn adjacent_key(rng: &mut StdRng, c: char) -> Option<char> {
    let neighbours = qwerty_neighbours(c);
    let pick = *neighbours.choose(rng)?;
    Some(match_case(pick, c))
}

fn random_letter(rng: &mut StdRng, intended: char) -> char {
    loop {
        let pick = (b'a' + rng.random_range(0..26u8)) as char;
        if pick != intended.to_ascii_lowercase() {
            return match_case(pick, intended);
        }
    }
}

fn match_case(pick: char, like: char) -> char {
    if like.is_uppercase() {
        pick.to_ascii_uppercase()
    } else {
        pick
    }
}
