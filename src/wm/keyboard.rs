//! Keyboard Module
//!
//! Key symbol names, modifier cleaning and the resolved key/button binding
//! tables used by the event handlers.

use crate::config::{Action, Click, Config, modifier_mask};
use crate::wm::error::WmError;

/// X keysym value
pub type Keysym = u32;

pub const XK_NUM_LOCK: Keysym = 0xff7f;

const LOCK: u16 = 1 << 1;

/// Modifiers that take part in binding comparisons
const BINDABLE: u16 = 0x00ff;

/// Keysym for a key name as written in the config file
pub fn keysym_from_name(name: &str) -> Option<Keysym> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        // Latin-1 keysyms equal their code point; letters use the lowercase symbol
        if c.is_ascii_alphanumeric() {
            return Some(c.to_ascii_lowercase() as Keysym);
        }
    }
    let sym = match name {
        "space" => 0x0020,
        "comma" => 0x002c,
        "minus" => 0x002d,
        "period" => 0x002e,
        "slash" => 0x002f,
        "semicolon" => 0x003b,
        "equal" => 0x003d,
        "bracketleft" => 0x005b,
        "backslash" => 0x005c,
        "bracketright" => 0x005d,
        "grave" => 0x0060,
        "apostrophe" => 0x0027,
        "BackSpace" => 0xff08,
        "Tab" => 0xff09,
        "Return" => 0xff0d,
        "Escape" => 0xff1b,
        "Home" => 0xff50,
        "Left" => 0xff51,
        "Up" => 0xff52,
        "Right" => 0xff53,
        "Down" => 0xff54,
        "Prior" | "Page_Up" => 0xff55,
        "Next" | "Page_Down" => 0xff56,
        "End" => 0xff57,
        "Print" => 0xff61,
        "Delete" => 0xffff,
        _ => return function_key(name),
    };
    Some(sym)
}

fn function_key(name: &str) -> Option<Keysym> {
    let n: u32 = name.strip_prefix('F')?.parse().ok()?;
    (1..=24).contains(&n).then(|| 0xffbe + n - 1)
}

/// Strip Lock and NumLock so bindings fire regardless of their state
pub fn clean_mask(mask: u16, numlock: u16) -> u16 {
    mask & !(numlock | LOCK) & BINDABLE
}

/// Extra modifier sets each grab is repeated with
pub fn modifier_variants(numlock: u16) -> [u16; 4] {
    [0, LOCK, numlock, numlock | LOCK]
}

/// Cached keycode-to-keysym table from GetKeyboardMapping
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    pub min_keycode: u8,
    pub keysyms_per_keycode: u8,
    pub keysyms: Vec<Keysym>,
}

impl KeyMap {
    /// First-column keysym of a keycode
    pub fn keysym(&self, keycode: u8) -> Option<Keysym> {
        let per = self.keysyms_per_keycode as usize;
        let row = keycode.checked_sub(self.min_keycode)? as usize;
        self.keysyms
            .get(row * per)
            .copied()
            .filter(|&sym| sym != 0)
    }

    /// Lowest keycode producing `keysym` in any column
    pub fn keycode(&self, keysym: Keysym) -> Option<u8> {
        let per = self.keysyms_per_keycode as usize;
        if per == 0 || keysym == 0 {
            return None;
        }
        let index = self.keysyms.iter().position(|&sym| sym == keysym)?;
        u8::try_from(index / per + self.min_keycode as usize).ok()
    }

    /// Modifier bit whose keycodes include Num_Lock, from GetModifierMapping
    pub fn numlock_mask(&self, modifier_keycodes: &[u8], keycodes_per_modifier: u8) -> u16 {
        let Some(numlock) = self.keycode(XK_NUM_LOCK) else {
            return 0;
        };
        let per = keycodes_per_modifier as usize;
        if per == 0 {
            return 0;
        }
        modifier_keycodes
            .chunks(per)
            .take(8)
            .enumerate()
            .filter(|(_, codes)| codes.contains(&numlock))
            .map(|(i, _)| 1u16 << i)
            .last()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub mask: u16,
    pub keysym: Keysym,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub click: Click,
    pub mask: u16,
    pub button: u8,
    pub action: Action,
}

/// Bindings with names resolved to keysyms and masks
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub keys: Vec<KeyBinding>,
    pub buttons: Vec<ButtonBinding>,
}

impl Bindings {
    pub fn from_config(config: &Config) -> Result<Self, WmError> {
        let keys = config
            .keys
            .iter()
            .map(|k| {
                let keysym = keysym_from_name(&k.key)
                    .ok_or_else(|| WmError::Config(format!("unknown key name {:?}", k.key)))?;
                Ok(KeyBinding {
                    mask: modifier_mask(&k.modifiers),
                    keysym,
                    action: k.action.clone(),
                })
            })
            .collect::<Result<Vec<_>, WmError>>()?;
        let buttons = config
            .buttons
            .iter()
            .map(|b| ButtonBinding {
                click: b.click,
                mask: modifier_mask(&b.modifiers),
                button: b.button,
                action: b.action.clone(),
            })
            .collect();
        Ok(Self { keys, buttons })
    }

    /// Actions bound to a key press, in table order
    pub fn key_actions(&self, keysym: Keysym, state: u16, numlock: u16) -> Vec<Action> {
        let state = clean_mask(state, numlock);
        self.keys
            .iter()
            .filter(|k| k.keysym == keysym && clean_mask(k.mask, numlock) == state)
            .map(|k| k.action.clone())
            .collect()
    }

    /// Actions bound to a button press in the given context, in table order
    pub fn button_actions(&self, click: Click, button: u8, state: u16, numlock: u16) -> Vec<Action> {
        let state = clean_mask(state, numlock);
        self.buttons
            .iter()
            .filter(|b| {
                b.click == click && b.button == button && clean_mask(b.mask, numlock) == state
            })
            .map(|b| b.action.clone())
            .collect()
    }

    /// (modifiers, keysym) pairs to grab on the root window
    pub fn key_grabs(&self) -> Vec<(u16, Keysym)> {
        self.keys.iter().map(|k| (k.mask, k.keysym)).collect()
    }

    /// (modifiers, button) pairs to grab on every client window
    pub fn client_button_grabs(&self) -> Vec<(u16, u8)> {
        self.buttons
            .iter()
            .filter(|b| b.click == Click::ClientWindow)
            .map(|b| (b.mask, b.button))
            .collect()
    }
}
