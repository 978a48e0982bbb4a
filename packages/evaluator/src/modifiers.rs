//! # Event modifiers
//!
//! Closed vocabulary of flags that can be attached to an event binding,
//! either through the dotted key (`keyup.enter`, `click.stop.debounce`) or as
//! flags on the binding value.
//!
//! ## Groups
//!
//! - **Host guards**: `stop prevent self exact passive capture`, mouse
//!   buttons and system keys. Checked synchronously on dispatch.
//! - **Keyboard filters**: named keys plus system keys on `key*` events.
//! - **Extra**: `once`, `debounce`, `throttle`. Implemented by the event
//!   normalizer.

use crate::error::ValidationError;
use crate::events::{DomEvent, MouseButton};
use crate::rate_limit::{RateLimitKind, RateLimitOptions};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Stop,
    Prevent,
    SelfOnly,
    Exact,
    Left,
    Right,
    Middle,
    Ctrl,
    Shift,
    Alt,
    Meta,
    Passive,
    Capture,
    Enter,
    Tab,
    Delete,
    Esc,
    Space,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Once,
    Debounce,
    Throttle,
}

impl Modifier {
    pub const ALL: [Modifier; 27] = [
        Modifier::Stop,
        Modifier::Prevent,
        Modifier::SelfOnly,
        Modifier::Exact,
        Modifier::Left,
        Modifier::Right,
        Modifier::Middle,
        Modifier::Ctrl,
        Modifier::Shift,
        Modifier::Alt,
        Modifier::Meta,
        Modifier::Passive,
        Modifier::Capture,
        Modifier::Enter,
        Modifier::Tab,
        Modifier::Delete,
        Modifier::Esc,
        Modifier::Space,
        Modifier::Up,
        Modifier::Down,
        Modifier::PageUp,
        Modifier::PageDown,
        Modifier::Home,
        Modifier::End,
        Modifier::Once,
        Modifier::Debounce,
        Modifier::Throttle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Stop => "stop",
            Modifier::Prevent => "prevent",
            Modifier::SelfOnly => "self",
            Modifier::Exact => "exact",
            Modifier::Left => "left",
            Modifier::Right => "right",
            Modifier::Middle => "middle",
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
            Modifier::Meta => "meta",
            Modifier::Passive => "passive",
            Modifier::Capture => "capture",
            Modifier::Enter => "enter",
            Modifier::Tab => "tab",
            Modifier::Delete => "delete",
            Modifier::Esc => "esc",
            Modifier::Space => "space",
            Modifier::Up => "up",
            Modifier::Down => "down",
            Modifier::PageUp => "pageup",
            Modifier::PageDown => "pagedown",
            Modifier::Home => "home",
            Modifier::End => "end",
            Modifier::Once => "once",
            Modifier::Debounce => "debounce",
            Modifier::Throttle => "throttle",
        }
    }

    pub fn parse(name: &str) -> Option<Modifier> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn is_system_key(self) -> bool {
        matches!(
            self,
            Modifier::Ctrl | Modifier::Shift | Modifier::Alt | Modifier::Meta
        )
    }

    pub fn is_mouse_button(self) -> bool {
        matches!(self, Modifier::Left | Modifier::Right | Modifier::Middle)
    }

    /// Modifiers that act as key filters on `key*` events
    pub fn is_keyboard(self) -> bool {
        self.key_identity().is_some()
    }

    /// Key names and legacy key codes matched by a keyboard modifier
    fn key_identity(self) -> Option<(&'static [&'static str], &'static [u32])> {
        let identity: (&'static [&'static str], &'static [u32]) = match self {
            Modifier::Enter => (&["Enter"], &[13]),
            Modifier::Tab => (&["Tab"], &[9]),
            Modifier::Delete => (&["Delete"], &[46]),
            Modifier::Esc => (&["Escape", "Esc"], &[27]),
            Modifier::Space => (&[" ", "Space", "Spacebar"], &[32]),
            Modifier::Up => (&["ArrowUp", "Up"], &[38]),
            Modifier::Down => (&["ArrowDown", "Down"], &[40]),
            Modifier::Left => (&["ArrowLeft", "Left"], &[37]),
            Modifier::Right => (&["ArrowRight", "Right"], &[39]),
            Modifier::Middle => (&["Middle"], &[3]),
            Modifier::Ctrl => (&["Control"], &[17]),
            Modifier::Alt => (&["Alt"], &[18]),
            Modifier::Shift => (&["Shift"], &[16]),
            Modifier::Meta => (&["Meta"], &[91]),
            Modifier::PageUp => (&["PageUp"], &[33]),
            Modifier::PageDown => (&["PageDown"], &[34]),
            Modifier::Home => (&["Home"], &[36]),
            Modifier::End => (&["End"], &[35]),
            _ => return None,
        };
        Some(identity)
    }

    /// Whether the event's key or key code is the one this modifier names
    pub fn matches_key(self, event: &DomEvent) -> bool {
        let Some((names, codes)) = self.key_identity() else {
            return false;
        };
        let by_name = event
            .key
            .as_deref()
            .map_or(false, |key| names.iter().any(|name| name.eq_ignore_ascii_case(key)));
        let by_code = event.key_code.map_or(false, |code| codes.contains(&code));
        by_name || by_code
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{delay, leading, trailing, maxWait}` options for debounce/throttle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitSpec {
    pub delay: Option<u64>,
    pub leading: Option<bool>,
    pub trailing: Option<bool>,
    pub max_wait: Option<u64>,
}

impl RateLimitSpec {
    pub fn delay(ms: u64) -> Self {
        Self {
            delay: Some(ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagValue {
    Enabled(bool),
    Rate(RateLimitSpec),
}

impl FlagValue {
    pub fn is_on(&self) -> bool {
        !matches!(self, FlagValue::Enabled(false))
    }

    /// `true`/`false`, a number (delay in ms) or an options object
    pub fn from_json(value: &Value) -> Option<FlagValue> {
        match value {
            Value::Bool(on) => Some(FlagValue::Enabled(*on)),
            Value::Number(n) => n.as_u64().map(|ms| FlagValue::Rate(RateLimitSpec::delay(ms))),
            Value::Object(_) => serde_json::from_value(value.clone())
                .ok()
                .map(FlagValue::Rate),
            Value::Null => Some(FlagValue::Enabled(false)),
            _ => None,
        }
    }
}

impl From<bool> for FlagValue {
    fn from(on: bool) -> Self {
        FlagValue::Enabled(on)
    }
}

impl From<u64> for FlagValue {
    fn from(ms: u64) -> Self {
        FlagValue::Rate(RateLimitSpec::delay(ms))
    }
}

impl From<RateLimitSpec> for FlagValue {
    fn from(spec: RateLimitSpec) -> Self {
        FlagValue::Rate(spec)
    }
}

/// Ordered set of modifier flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierSet {
    flags: IndexMap<Modifier, FlagValue>,
}

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, modifier: Modifier, value: impl Into<FlagValue>) {
        self.flags.insert(modifier, value.into());
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.set(modifier, true);
        self
    }

    pub fn get(&self, modifier: Modifier) -> Option<&FlagValue> {
        self.flags.get(&modifier)
    }

    pub fn is_set(&self, modifier: Modifier) -> bool {
        self.flags.get(&modifier).map_or(false, FlagValue::is_on)
    }

    pub fn is_empty(&self) -> bool {
        !self.flags.values().any(FlagValue::is_on)
    }

    /// Overlay `other` on top of this set; `other` wins on conflict
    pub fn merge(&mut self, other: &ModifierSet) {
        for (modifier, value) in &other.flags {
            self.flags.insert(*modifier, *value);
        }
    }

    /// Enabled modifiers in insertion order
    pub fn enabled(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.flags
            .iter()
            .filter(|(_, value)| value.is_on())
            .map(|(modifier, _)| *modifier)
    }

    pub fn keyboard_filters(&self) -> Vec<Modifier> {
        self.enabled().filter(|m| m.is_keyboard()).collect()
    }

    /// Debounce wins over throttle when both are set
    pub fn rate_limit(&self, default_ms: u64) -> Option<RateLimitOptions> {
        let (kind, value) = [RateLimitKind::Debounce, RateLimitKind::Throttle]
            .into_iter()
            .find_map(|kind| {
                let modifier = match kind {
                    RateLimitKind::Debounce => Modifier::Debounce,
                    RateLimitKind::Throttle => Modifier::Throttle,
                };
                self.get(modifier)
                    .filter(|value| value.is_on())
                    .map(|value| (kind, *value))
            })?;
        let spec = match value {
            FlagValue::Rate(spec) => spec,
            FlagValue::Enabled(_) => RateLimitSpec::default(),
        };
        Some(RateLimitOptions::from_spec(
            kind,
            &spec,
            Duration::from_millis(default_ms),
        ))
    }

    /// Host guards. Returns false when the event must not reach the handler.
    ///
    /// `stop` and `prevent` act on the event and never block. On keyboard
    /// events, system keys and `left`/`right`/`middle` are key filters rather
    /// than guards and are skipped here.
    pub fn guard(&self, event: &DomEvent, keyboard: bool) -> bool {
        for modifier in self.enabled() {
            let pass = match modifier {
                Modifier::Stop => {
                    event.stop_propagation();
                    true
                }
                Modifier::Prevent => {
                    event.prevent_default();
                    true
                }
                Modifier::SelfOnly => event.target.is_none() || event.target == event.current_target,
                Modifier::Ctrl if !keyboard => event.ctrl_key,
                Modifier::Shift if !keyboard => event.shift_key,
                Modifier::Alt if !keyboard => event.alt_key,
                Modifier::Meta if !keyboard => event.meta_key,
                Modifier::Left if !keyboard => event.button.map_or(true, |b| b == MouseButton::Left),
                Modifier::Middle if !keyboard => {
                    event.button.map_or(true, |b| b == MouseButton::Middle)
                }
                Modifier::Right if !keyboard => event.button.map_or(true, |b| b == MouseButton::Right),
                Modifier::Exact => self.exact_match(event),
                _ => true,
            };
            if !pass {
                return false;
            }
        }
        true
    }

    fn exact_match(&self, event: &DomEvent) -> bool {
        let pressed = [
            (Modifier::Ctrl, event.ctrl_key),
            (Modifier::Shift, event.shift_key),
            (Modifier::Alt, event.alt_key),
            (Modifier::Meta, event.meta_key),
        ];
        pressed
            .iter()
            .all(|(modifier, down)| !*down || self.is_set(*modifier))
    }
}

/// Split `click.stop.debounce` into the base name and its modifier flags
pub fn parse_event_key(key: &str) -> Result<(String, ModifierSet), ValidationError> {
    let mut parts = key.split('.');
    let base = parts.next().unwrap_or_default().to_string();
    if base.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "events".to_string(),
            message: format!("event key '{key}' has no event name"),
        });
    }

    let mut set = ModifierSet::new();
    for part in parts {
        let modifier = Modifier::parse(part).ok_or_else(|| ValidationError::UnknownModifier {
            event: key.to_string(),
            modifier: part.to_string(),
        })?;
        set.set(modifier, true);
    }
    Ok((base, set))
}

/// `click` → `onClick`; keys already shaped like `onClick` are kept
pub fn handler_key(base: &str) -> String {
    if is_handler_key(base) {
        return base.to_string();
    }
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}

/// Event name behind a handler key: `onKeyup` → `keyup`
pub fn event_name(key: &str) -> String {
    if !is_handler_key(key) {
        return key.to_string();
    }
    let rest = &key[2..];
    let mut chars = rest.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

fn is_handler_key(key: &str) -> bool {
    key.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .map_or(false, |c| c.is_ascii_uppercase())
}
