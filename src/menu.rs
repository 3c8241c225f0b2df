// ~/vscode-background/src/menu.rs
//
// Nested terminal menus over the settings store. Every prompt goes through
// `Prompter`; each submenu loops until the user backs out, so the same menu
// re-opens with fresh values after a change.

use std::fmt;

use inquire::{validator::Validation, Confirm, CustomUserError, InquireError, Select, Text};

use crate::{
    app::{App, Reload},
    data_loaders::config::{Alignment, ConfigError, Repeat, Setting, SizeMode, UiRegion, MANUAL},
    error, glob_resolver, info,
    patch::Outcome,
    sources::{
        folder_glob, validate_blur, validate_change_time, validate_edit, validate_file, validate_folder,
        validate_glob, validate_opacity, validate_url,
    },
    utility::plural,
    warn,
};

pub type Validator = fn(&str) -> Result<(), String>;

/// Accepts anything; used for free-form CSS values.
fn any_value(_: &str) -> Result<(), String> {
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MenuItem {
    pub label: String,
    pub description: String,
    pub detail: String,
}

impl MenuItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)?;
        if !self.description.is_empty() {
            write!(f, "  ({})", self.description)?;
        }
        if !self.detail.is_empty() {
            write!(f, "  {}", self.detail)?;
        }
        Ok(())
    }
}

/// Everything the menus ask of a user.
pub trait Prompter {
    /// Index of the chosen item; `None` when the user backs out.
    fn select(&mut self, title: &str, items: &[MenuItem]) -> Option<usize>;
    /// Only input accepted by `validate` is returned.
    fn text(&mut self, title: &str, initial: &str, validate: Validator) -> Option<String>;
    fn confirm(&mut self, question: &str, default: bool) -> bool;
    fn message(&mut self, text: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn select(&mut self, title: &str, items: &[MenuItem]) -> Option<usize> {
        match Select::new(title, items.to_vec()).with_page_size(14).raw_prompt() {
            Ok(choice) => Some(choice.index),
            Err(InquireError::OperationCanceled) => None,
            Err(e) => {
                warn!("[MENU] Select prompt failed: {e}");
                None
            }
        }
    }

    fn text(&mut self, title: &str, initial: &str, validate: Validator) -> Option<String> {
        let validator = move |input: &str| {
            Ok::<Validation, CustomUserError>(match validate(input) {
                Ok(()) => Validation::Valid,
                Err(message) => Validation::Invalid(message.into()),
            })
        };

        match Text::new(title)
            .with_initial_value(initial)
            .with_validator(validator)
            .prompt_skippable()
        {
            Ok(value) => value,
            Err(e) => {
                warn!("[MENU] Text prompt failed: {e}");
                None
            }
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> bool {
        Confirm::new(question).with_default(default).prompt().unwrap_or(false)
    }

    fn message(&mut self, text: &str) {
        println!("{text}");
    }
}

/* =========================
   MENUS
   ========================= */

#[derive(Debug, Clone, Copy)]
enum RootAction {
    Region(UiRegion),
    Toggle(Setting),
    Css,
    Install,
    Uninstall,
    Reload,
}

const TOGGLES: [(Setting, &str); 3] = [
    (Setting::RenderContentAboveBackground, "Render Content Above Background"),
    (Setting::SmoothImageRendering, "Smooth Image Rendering"),
    (Setting::EmbedImages, "Embed Images"),
];

const REGION_ENTRIES: [Setting; 7] = [
    Setting::Backgrounds,
    Setting::BackgroundAlignment,
    Setting::BackgroundBlur,
    Setting::BackgroundOpacity,
    Setting::BackgroundRepeat,
    Setting::BackgroundSize,
    Setting::BackgroundChangeTime,
];

const ADD_ENTRIES: [&str; 4] = ["Add a File", "Add a Folder", "Add a Glob", "Add a URL"];

pub struct Menu<'a> {
    app: &'a mut App,
    prompter: &'a mut dyn Prompter,
}

impl<'a> Menu<'a> {
    pub fn new(app: &'a mut App, prompter: &'a mut dyn Prompter) -> Self {
        Self { app, prompter }
    }

    pub fn run(&mut self) -> Result<(), ConfigError> {
        info!("[MENU] Opened");
        loop {
            let entries = self.root_entries();
            let items: Vec<MenuItem> = entries.iter().map(|(item, _)| item.clone()).collect();
            let Some(index) = self.prompter.select("Background", &items) else {
                return Ok(());
            };

            match entries[index].1 {
                RootAction::Region(region) => self.region_menu(region)?,
                RootAction::Toggle(setting) => {
                    let current = self.app.store.get_bool(setting, None);
                    self.app.store.update(setting, !current, None, false)?;
                    self.after_change();
                }
                RootAction::Css => self.css_prompt()?,
                RootAction::Install => self.install(),
                RootAction::Uninstall => self.uninstall(),
                RootAction::Reload => self.reload(),
            }
        }
    }

    fn root_entries(&self) -> Vec<(MenuItem, RootAction)> {
        let store = &self.app.store;
        let mut entries = Vec::new();

        for region in UiRegion::ALL {
            let settings = store.region(region);
            let detail = [
                (Setting::BackgroundAlignment, "Alignment"),
                (Setting::BackgroundBlur, "Blur"),
                (Setting::BackgroundOpacity, "Opacity"),
                (Setting::BackgroundRepeat, "Repeat"),
                (Setting::BackgroundSize, "Size"),
            ]
            .iter()
            .map(|(setting, name)| format!("{} {}", settings.display(*setting), name))
            .collect::<Vec<_>>()
            .join(" | ");

            entries.push((
                MenuItem::new(region.label())
                    .description(plural(settings.sources.len(), "Background"))
                    .detail(detail),
                RootAction::Region(region),
            ));
        }

        for (setting, label) in TOGGLES {
            let state = if store.get_bool(setting, None) { "On" } else { "Off" };
            entries.push((MenuItem::new(label).description(state), RootAction::Toggle(setting)));
        }

        let css = store.get_str(Setting::Css, None);
        let css_state = if css.trim().is_empty() { "None" } else { "Set" };
        entries.push((MenuItem::new("Custom CSS").description(css_state), RootAction::Css));

        entries.push((
            MenuItem::new("Install").description("Install background"),
            RootAction::Install,
        ));
        entries.push((
            MenuItem::new("Uninstall").description("Uninstall background"),
            RootAction::Uninstall,
        ));
        entries.push((
            MenuItem::new("Reload Background")
                .description("Randomizes installed backgrounds; background must already be installed"),
            RootAction::Reload,
        ));

        entries
    }

    fn region_menu(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let title = format!("{} Background", region.label());
        loop {
            let settings = self.app.store.region(region);
            let items: Vec<MenuItem> = REGION_ENTRIES
                .iter()
                .map(|setting| match setting {
                    Setting::Backgrounds => MenuItem::new("File")
                        .description(plural(settings.sources.len(), "Background"))
                        .detail("Select background image files"),
                    Setting::BackgroundAlignment => MenuItem::new("Alignment")
                        .description(settings.display(*setting))
                        .detail("Background image alignment"),
                    Setting::BackgroundBlur => MenuItem::new("Blur")
                        .description(settings.display(*setting))
                        .detail("Background image blur"),
                    Setting::BackgroundOpacity => MenuItem::new("Opacity")
                        .description(settings.display(*setting))
                        .detail("Background image opacity"),
                    Setting::BackgroundRepeat => MenuItem::new("Repeat")
                        .description(settings.display(*setting))
                        .detail("Background image repeat"),
                    Setting::BackgroundSize => MenuItem::new("Size")
                        .description(settings.display(*setting))
                        .detail("Background image size"),
                    _ => MenuItem::new("Change Time")
                        .description(settings.display(*setting))
                        .detail("Seconds between image changes, 0 to disable"),
                })
                .collect();

            let Some(index) = self.prompter.select(&title, &items) else {
                return Ok(());
            };

            match REGION_ENTRIES[index] {
                Setting::Backgrounds => self.files_menu(region)?,
                Setting::BackgroundAlignment => self.alignment_menu(region)?,
                Setting::BackgroundBlur => self.blur_prompt(region)?,
                Setting::BackgroundOpacity => self.opacity_prompt(region)?,
                Setting::BackgroundRepeat => self.repeat_menu(region)?,
                Setting::BackgroundSize => self.size_menu(region)?,
                _ => self.change_time_prompt(region)?,
            }
        }
    }

    /* ---------- files ---------- */

    fn files_menu(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let title = format!("{} Background - Files", region.label());
        loop {
            let sources = self.app.store.sources(region);
            let mut items: Vec<MenuItem> = sources
                .iter()
                .map(|source| {
                    MenuItem::new(source.as_str())
                        .description(plural(glob_resolver::count(source), "matching file"))
                })
                .collect();
            items.extend(ADD_ENTRIES.iter().map(|label| MenuItem::new(*label)));

            let Some(index) = self.prompter.select(&title, &items) else {
                return Ok(());
            };

            if let Some(existing) = sources.get(index) {
                self.edit_source(region, existing)?;
                continue;
            }

            let added = match index - sources.len() {
                0 => self
                    .prompter
                    .text("Add a File (image path)", "", validate_file)
                    .map(|path| path.trim().to_string()),
                1 => self
                    .prompter
                    .text("Add a Folder (every image below it)", "", validate_folder)
                    .map(|dir| folder_glob(&dir)),
                2 => self
                    .prompter
                    .text("Add a Glob (use only '/' for directories)", "", validate_glob)
                    .map(|glob| glob.trim().to_string()),
                _ => self
                    .prompter
                    .text("Add a URL (must be served over HTTPS)", "", validate_url)
                    .map(|url| url.trim().to_string()),
            };

            if let Some(source) = added {
                self.app.store.add_sources(region, &[source])?;
                self.after_change();
            }
        }
    }

    fn edit_source(&mut self, region: UiRegion, existing: &str) -> Result<(), ConfigError> {
        let title = format!("Update {existing} (leave blank to remove)");
        let Some(value) = self.prompter.text(&title, existing, validate_edit) else {
            return Ok(());
        };

        let value = value.trim();
        if value.is_empty() {
            self.app.store.remove_source(region, existing)?;
        } else {
            self.app.store.replace_source(region, existing, value)?;
        }
        self.after_change();
        Ok(())
    }

    /* ---------- choices ---------- */

    fn alignment_menu(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let settings = self.app.store.region(region);
        let items: Vec<MenuItem> = Alignment::ALL
            .iter()
            .map(|a| {
                let item = MenuItem::new(a.label());
                if *a == settings.alignment {
                    item.description("current")
                } else {
                    item
                }
            })
            .collect();

        let title = format!("{} Background - Alignment", region.label());
        let Some(index) = self.prompter.select(&title, &items) else {
            return Ok(());
        };

        let choice = Alignment::ALL[index];
        if choice == Alignment::Manual {
            let prompt = "Background position (literal 'background-position' value)";
            let Some(value) = self.prompter.text(prompt, &settings.alignment_value, any_value) else {
                return Ok(());
            };
            self.set_manual(region, Setting::BackgroundAlignment, Setting::BackgroundAlignmentValue, &value)?;
        } else {
            self.app
                .store
                .update(Setting::BackgroundAlignment, choice.label(), Some(region), false)?;
        }

        self.after_change();
        Ok(())
    }

    fn repeat_menu(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let current = self.app.store.region(region).repeat;
        let items: Vec<MenuItem> = Repeat::ALL
            .iter()
            .map(|r| {
                let item = MenuItem::new(r.label()).detail(r.description());
                if *r == current {
                    item.description("current")
                } else {
                    item
                }
            })
            .collect();

        let title = format!("{} Background - Repeat", region.label());
        if let Some(index) = self.prompter.select(&title, &items) {
            self.app
                .store
                .update(Setting::BackgroundRepeat, Repeat::ALL[index].label(), Some(region), false)?;
            self.after_change();
        }
        Ok(())
    }

    fn size_menu(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let settings = self.app.store.region(region);
        let items: Vec<MenuItem> = SizeMode::ALL
            .iter()
            .map(|s| {
                let item = MenuItem::new(s.label()).detail(s.description());
                if *s == settings.size {
                    item.description("current")
                } else {
                    item
                }
            })
            .collect();

        let title = format!("{} Background - Size", region.label());
        let Some(index) = self.prompter.select(&title, &items) else {
            return Ok(());
        };

        let choice = SizeMode::ALL[index];
        if choice == SizeMode::Manual {
            let prompt = "Background size (literal 'background-size' value)";
            let Some(value) = self.prompter.text(prompt, &settings.size_value, any_value) else {
                return Ok(());
            };
            self.set_manual(region, Setting::BackgroundSize, Setting::BackgroundSizeValue, &value)?;
        } else {
            self.app
                .store
                .update(Setting::BackgroundSize, choice.label(), Some(region), false)?;
        }

        self.after_change();
        Ok(())
    }

    /// Switches an enum setting to Manual and stores its literal value, one notification.
    fn set_manual(&mut self, region: UiRegion, mode: Setting, value: Setting, literal: &str) -> Result<(), ConfigError> {
        let store = &mut self.app.store;
        let mode_changed = store.update(mode, MANUAL, Some(region), true)?;
        let value_changed = store.update(value, literal.trim(), Some(region), true)?;
        if mode_changed || value_changed {
            store.notify();
        }
        Ok(())
    }

    /* ---------- text values ---------- */

    fn blur_prompt(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let current = self.app.store.region(region).blur;
        let title = format!("{} Background - Blur (CSS length)", region.label());
        if let Some(value) = self.prompter.text(&title, &current, validate_blur) {
            let value = value.trim();
            if !value.is_empty() {
                self.app
                    .store
                    .update(Setting::BackgroundBlur, value, Some(region), false)?;
                self.after_change();
            }
        }
        Ok(())
    }

    fn opacity_prompt(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let current = self.app.store.region(region).opacity.to_string();
        let title = format!("{} Background - Opacity (0 to 1)", region.label());
        self.number_prompt(region, Setting::BackgroundOpacity, &title, &current, validate_opacity)
    }

    fn change_time_prompt(&mut self, region: UiRegion) -> Result<(), ConfigError> {
        let current = self.app.store.region(region).change_time.to_string();
        let title = format!("{} Background - Change Time (seconds, 0 disables)", region.label());
        self.number_prompt(region, Setting::BackgroundChangeTime, &title, &current, validate_change_time)
    }

    fn number_prompt(
        &mut self,
        region: UiRegion,
        setting: Setting,
        title: &str,
        current: &str,
        validate: Validator,
    ) -> Result<(), ConfigError> {
        let Some(value) = self.prompter.text(title, current, validate) else {
            return Ok(());
        };
        if let Ok(number) = value.trim().parse::<f64>() {
            self.app.store.update(setting, number, Some(region), false)?;
            self.after_change();
        }
        Ok(())
    }

    fn css_prompt(&mut self) -> Result<(), ConfigError> {
        let current = self.app.store.get_str(Setting::Css, None);
        if let Some(value) = self.prompter.text("Custom CSS", &current, any_value) {
            self.app.store.update(Setting::Css, value, None, false)?;
            self.after_change();
        }
        Ok(())
    }

    /* ---------- host ---------- */

    /// Offers a reload after a notifying change while the background is installed.
    fn after_change(&mut self) {
        if !self.app.store.take_changed() || !self.app.is_installed() {
            return;
        }
        if self.prompter.confirm("Background settings changed. Reload now?", true) {
            self.install();
        }
    }

    fn install(&mut self) {
        let prompter = &mut *self.prompter;
        let result = self.app.install(|| {
            prompter.confirm("Installing requires elevated permissions. Continue?", false)
        });
        let message = match result {
            Ok(Outcome::Declined) => "Nothing was changed.".to_string(),
            Ok(_) => "Background installed. Restart the editor to apply changes.".to_string(),
            Err(e) => {
                error!("[MENU] Install failed: {e}");
                format!("Install failed: {e}")
            }
        };
        self.prompter.message(&message);
    }

    fn uninstall(&mut self) {
        let prompter = &mut *self.prompter;
        let result = self.app.uninstall(|| {
            prompter.confirm("Uninstalling requires elevated permissions. Continue?", false)
        });
        let message = match result {
            Ok(Outcome::Declined) => "Nothing was changed.".to_string(),
            Ok(_) => "Background uninstalled. Restart the editor to apply changes.".to_string(),
            Err(e) => {
                error!("[MENU] Uninstall failed: {e}");
                format!("Uninstall failed: {e}")
            }
        };
        self.prompter.message(&message);
    }

    fn reload(&mut self) {
        let prompter = &mut *self.prompter;
        let result = self.app.reload(|| {
            prompter.confirm("Reloading requires elevated permissions. Continue?", false)
        });
        let message = match result {
            Ok(Reload::NotInstalled) => "Background is not installed.".to_string(),
            Ok(Reload::Unchanged) => "Background is up to date. Restart the editor to reshuffle.".to_string(),
            Ok(Reload::Applied(Outcome::Declined)) => "Nothing was changed.".to_string(),
            Ok(Reload::Applied(_)) => "Background reloaded. Restart the editor to apply changes.".to_string(),
            Err(e) => {
                error!("[MENU] Reload failed: {e}");
                format!("Reload failed: {e}")
            }
        };
        self.prompter.message(&message);
    }
}
