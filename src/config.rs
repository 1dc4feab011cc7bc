//! Configuration system for speck
//!
//! Loads configuration from TOML file at `~/.config/speck/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use x11rb::protocol::xproto::ModMask;

use crate::wm::error::WmError;
use crate::wm::keyboard;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub appearance: AppearanceConfig,
    pub tags: TagsConfig,
    pub reserve: ReserveConfig,
    pub rules: Vec<Rule>,
    pub keys: Vec<KeyConfig>,
    pub buttons: Vec<ButtonConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            appearance: AppearanceConfig::default(),
            tags: TagsConfig::default(),
            reserve: ReserveConfig::default(),
            rules: default_rules(),
            keys: default_keys(),
            buttons: default_buttons(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Read, parse and validate a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("speck");

        Ok(config_dir.join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    pub fn numtags(&self) -> u32 {
        self.tags.names.len() as u32
    }

    /// Check every tag, key name and action argument
    pub fn validate(&self) -> Result<(), WmError> {
        let numtags = self.numtags();
        if numtags == 0 {
            return Err(WmError::Config("at least one tag is required".into()));
        }
        let valid_tag = |tag: u32| (1..=numtags).contains(&tag);

        for (what, tag) in [("initial", self.tags.initial), ("alternate", self.tags.alternate)] {
            if !valid_tag(tag) {
                return Err(WmError::Config(format!(
                    "{what} tag {tag} is outside 1..={numtags}"
                )));
            }
        }
        for rule in &self.rules {
            if !valid_tag(rule.tag) {
                return Err(WmError::Config(format!(
                    "rule {:?} assigns tag {} outside 1..={numtags}",
                    rule, rule.tag
                )));
            }
        }
        for key in &self.keys {
            if keyboard::keysym_from_name(&key.key).is_none() {
                return Err(WmError::Config(format!("unknown key name {:?}", key.key)));
            }
            key.action.validate(numtags)?;
        }
        for button in &self.buttons {
            if button.button == 0 {
                return Err(WmError::Config("button 0 cannot be bound".into()));
            }
            button.action.validate(numtags)?;
        }
        Ok(())
    }
}

/// Border appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Border width in pixels
    pub border_px: u32,
    /// Edge snap distance in pixels during a move
    pub snap: u32,
    /// Focused border color (0xRRGGBB)
    pub border_focus: u32,
    /// Unfocused border color (0xRRGGBB)
    pub border_normal: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            border_px: 4,
            snap: 32,
            border_focus: 0xce5c00,
            border_normal: 0x676767,
        }
    }
}

/// Tag names and the two initially selected tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    pub names: Vec<String>,
    pub initial: u32,
    pub alternate: u32,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            names: ["1", "2", "3", "4"].map(String::from).to_vec(),
            initial: 1,
            alternate: 2,
        }
    }
}

/// Screen space (right and bottom) left to other programs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReserveConfig {
    pub x: u32,
    pub y: u32,
}

/// Initial tag assignment by WM_CLASS and title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tag: u32,
}

/// Modifier key names accepted in bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Shift,
    Lock,
    Control,
    Mod1,
    Mod2,
    Mod3,
    Mod4,
    Mod5,
}

impl Modifier {
    pub fn mask(self) -> u16 {
        let m = match self {
            Modifier::Shift => ModMask::SHIFT,
            Modifier::Lock => ModMask::LOCK,
            Modifier::Control => ModMask::CONTROL,
            Modifier::Mod1 => ModMask::M1,
            Modifier::Mod2 => ModMask::M2,
            Modifier::Mod3 => ModMask::M3,
            Modifier::Mod4 => ModMask::M4,
            Modifier::Mod5 => ModMask::M5,
        };
        u16::from(m)
    }
}

/// Combined mask of a modifier list
pub fn modifier_mask(modifiers: &[Modifier]) -> u16 {
    modifiers.iter().fold(0, |mask, m| mask | m.mask())
}

/// Where a button press landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Click {
    ClientWindow,
    RootWindow,
}

/// Bound operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Launch a program (argv)
    Spawn(Vec<String>),
    /// Show a tag; 0 returns to the previously viewed tag
    View(u32),
    /// Return to the previously viewed tag
    ViewPrevious,
    /// Move focus through the stack (+1 forward, -1 backward)
    FocusStack(i32),
    /// Ask the focused client to close, or kill it
    KillClient,
    /// Move the focused client to a tag
    Tag(u32),
    Quit,
    MoveMouse,
    ResizeMouse,
    Maximize,
    /// Go back to the geometry before the last resize
    Restore,
}

impl Action {
    fn validate(&self, numtags: u32) -> Result<(), WmError> {
        match self {
            Action::Spawn(argv) if argv.is_empty() => {
                Err(WmError::Config("spawn needs a program to run".into()))
            }
            Action::View(tag) if *tag > numtags => Err(WmError::Config(format!(
                "view {tag} is outside 0..={numtags}"
            ))),
            Action::Tag(tag) if !(1..=numtags).contains(tag) => Err(WmError::Config(format!(
                "tag {tag} is outside 1..={numtags}"
            ))),
            Action::FocusStack(0) => Err(WmError::Config("focus_stack needs a direction".into())),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    /// Key symbol name, e.g. "semicolon" or "F1"
    pub key: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub click: Click,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    /// Pointer button number (1 = left, 3 = right)
    pub button: u8,
    pub action: Action,
}

const MODKEY: [Modifier; 2] = [Modifier::Control, Modifier::Shift];
const MODKEY_ALT: [Modifier; 3] = [Modifier::Control, Modifier::Shift, Modifier::Mod1];

fn rule(class: Option<&str>, instance: Option<&str>, tag: u32) -> Rule {
    Rule {
        class: class.map(Into::into),
        instance: instance.map(Into::into),
        title: None,
        tag,
    }
}

fn default_rules() -> Vec<Rule> {
    vec![
        rule(Some("st"), None, 2),
        rule(Some("Emacs"), None, 2),
        rule(Some("Firefox"), None, 3),
        rule(Some("Tor Browser"), None, 3),
        rule(Some("Gimp"), None, 4),
        rule(Some("Shotcut"), None, 4),
        rule(Some("Kicad"), None, 4),
        rule(Some("Audacity"), None, 4),
        rule(None, Some("grdc"), 1),
    ]
}

fn key(modifiers: &[Modifier], key: &str, action: Action) -> KeyConfig {
    KeyConfig {
        modifiers: modifiers.to_vec(),
        key: key.into(),
        action,
    }
}

fn spawn(argv: &[&str]) -> Action {
    Action::Spawn(argv.iter().map(|s| s.to_string()).collect())
}

fn default_keys() -> Vec<KeyConfig> {
    let mut keys = vec![
        key(&MODKEY, "n", spawn(&["st", "-n", "st", "-T", "Terminal", "-e", "tmux"])),
        key(&MODKEY, "m", spawn(&["emacs"])),
        key(&MODKEY, "y", spawn(&["audacity"])),
        key(&MODKEY, "u", spawn(&["firefox", "-offline"])),
        key(&MODKEY, "i", spawn(&["gimp"])),
        key(&MODKEY, "o", spawn(&["kicad"])),
        key(&MODKEY, "p", spawn(&["shotcut", "--fullscreen"])),
        key(&MODKEY, "comma", spawn(&["tor-browser"])),
        key(&[Modifier::Mod1], "Tab", Action::ViewPrevious),
        key(&MODKEY, "semicolon", Action::FocusStack(1)),
        key(&MODKEY_ALT, "semicolon", Action::FocusStack(-1)),
        key(&MODKEY, "c", Action::KillClient),
    ];
    for (tag, name) in (1..).zip(["h", "j", "k", "l"]) {
        keys.push(key(&MODKEY, name, Action::View(tag)));
        keys.push(key(&MODKEY_ALT, name, Action::Tag(tag)));
    }
    keys.push(key(&MODKEY, "q", Action::Quit));
    keys
}

fn default_buttons() -> Vec<ButtonConfig> {
    vec![
        ButtonConfig {
            click: Click::ClientWindow,
            modifiers: MODKEY.to_vec(),
            button: 1,
            action: Action::MoveMouse,
        },
        ButtonConfig {
            click: Click::ClientWindow,
            modifiers: MODKEY.to_vec(),
            button: 3,
            action: Action::ResizeMouse,
        },
    ]
}
