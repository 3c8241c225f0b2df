// ~/vscode-background/src/generator.rs
//
// Renders the settings snapshot into the script appended to the workbench.
// Everything here is a pure function of its inputs; randomness only runs in
// the host once the script is loaded.

use std::collections::HashMap;

use crate::{
    data_loaders::config::{BackgroundConfig, RegionSettings, UiRegion},
    glob_resolver::{self, js_string, Reference},
};

/// Identifier inside the sentinel comments around the injected block.
pub const IDENTIFIER: &str = "vscode-background";

/// Images rotated across split editor groups.
const EDITOR_SLOTS: usize = 10;

/// Shortest rotation interval in seconds; 0 disables rotation.
const MIN_CHANGE_TIME: f64 = 5.0;

pub type ResolvedImages = HashMap<UiRegion, Vec<String>>;

pub fn start_marker() -> String {
    format!("/* {IDENTIFIER}-start */")
}

pub fn end_marker() -> String {
    format!("/* {IDENTIFIER}-end */")
}

/* =========================
   NUMBERS
   ========================= */

/// Decimal rounding, half away from zero on the shortest decimal form.
pub fn round(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let shifted: f64 = format!("{value}e{places}").parse().unwrap_or(value);
    format!("{}e-{places}", shifted.round()).parse().unwrap_or(value)
}

/// Rotation interval actually used: 0 stays disabled, anything else is at least 5 s.
pub fn effective_change_time(seconds: f64) -> f64 {
    if seconds == 0.0 || !seconds.is_finite() {
        return 0.0;
    }
    round(seconds, 2).max(MIN_CHANGE_TIME)
}

fn number(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_string()
}

/* =========================
   SELECTORS
   ========================= */

const EDITOR_AFTER: &str = ".split-view-view > .editor-group-container::after";
// backslashes are doubled for the JS template literal the CSS lives in
const SIDEBAR_AFTER: &str = r".split-view-view > #workbench\\.parts\\.sidebar::after";
const AUXILIARY_AFTER: &str = r".split-view-view > #workbench\\.parts\\.auxiliarybar::after";
const PANEL_AFTER: &str = r".split-view-view > #workbench\\.parts\\.panel::after";

/// Suffix after `body` that carries the window background.
fn window_suffix(render_above: bool) -> &'static str {
    if render_above {
        " > div[role=application] > div.monaco-grid-view::after"
    } else {
        "::before"
    }
}

fn region_selectors(region: UiRegion, render_above: bool) -> Vec<String> {
    match region {
        UiRegion::Window => vec![format!("body{}", window_suffix(render_above))],
        UiRegion::Editor => vec![EDITOR_AFTER.to_string()],
        UiRegion::Sidebar => vec![SIDEBAR_AFTER.to_string(), AUXILIARY_AFTER.to_string()],
        UiRegion::Panel => vec![PANEL_AFTER.to_string()],
    }
}

fn transition_selectors(region: UiRegion, render_above: bool) -> Vec<String> {
    let attr = format!("body[{}Transition=\"true\"]", region.key());
    match region {
        UiRegion::Window => vec![format!("{attr}{}", window_suffix(render_above))],
        _ => region_selectors(region, render_above)
            .into_iter()
            .map(|s| format!("{attr} {s}"))
            .collect(),
    }
}

/* =========================
   TEMPLATES
   ========================= */

const GLOBAL_STYLE: &str = r#"
const bk_global = document.createElement("style");
bk_global.id = "%ID%-global";
bk_global.setAttribute("type", "text/css");

bk_global.appendChild(document.createTextNode(`
    %TRANSITIONS% {
        opacity: 0;
    }

    %SHARED% {
        content: "";
        top: 0;
        width: 100%;
        height: 100%;
        %Z_INDEX%
        position: absolute;
        pointer-events: none;
        transition: opacity 1s ease-in-out;
        image-rendering: %RENDERING%;
    }

    div.notifications-toasts div.monaco-list[aria-label="Your Code installation appears to be corrupt. Please reinstall., notification"],
    div.notifications-toasts div.monaco-list[aria-label="Your Code - Insiders installation appears to be corrupt. Please reinstall., notification"] {
        display: none;
    }
`));

const shuffle = (arr) => {
    for(let i = arr.length - 1; i > 0; i--){
        const j = Math.floor(Math.random() * i);
        [arr[i], arr[j]] = [arr[j], arr[i]];
    };
};

const bk_loaders = [];
"#;

const REGION_STYLE: &str = r#"
const %NAME%Backgrounds = [%IMAGES%];
const i%TITLE%Backgrounds = [...Array(%COUNT%).keys()];

bk_global.appendChild(document.createTextNode(`
    %SELECTORS% {
        background-position: %POSITION%;
        background-repeat: %REPEAT%;
        background-size: %SIZE%;
        opacity: %OPACITY%;
        filter: blur(%BLUR%);
    }
`));

const bk_%NAME%_image = document.createElement("style");
bk_%NAME%_image.id = "%ID%-%NAME%-images";
bk_%NAME%_image.setAttribute("type", "text/css");

const set%TITLE%Background = () => {
    while(bk_%NAME%_image.firstChild){
        bk_%NAME%_image.removeChild(bk_%NAME%_image.firstChild);
    };

    shuffle(i%TITLE%Backgrounds);

    %IMAGE_RULES%
};
"#;

const SINGLE_IMAGE_RULE: &str = r#"
    bk_%NAME%_image.appendChild(document.createTextNode(`
        %SELECTOR% {
            background-image: url("${%NAME%Backgrounds[i%TITLE%Backgrounds[0]]}");
        }
    `));
"#;

const EDITOR_IMAGE_RULES: &str = r#"
    const len = Math.min(editorBackgrounds.length, %SLOTS%);

    for(let i = 0; i < len; i++){
        bk_editor_image.appendChild(document.createTextNode(`
            #workbench\\.parts\\.editor :not(.split-view-container) .split-view-container > .split-view-view:nth-child(${len}n+${i+1}) > .editor-group-container::after {
                background-image: url("${editorBackgrounds[iEditorBackgrounds[i]]}");
            }
        `));
    };
"#;

const SIDEBAR_IMAGE_RULES: &str = r#"
    bk_sidebar_image.appendChild(document.createTextNode(`
        %SIDEBAR% {
            background-image: url("${sidebarBackgrounds[iSidebarBackgrounds[0]]}");
        }
        %AUXILIARY% {
            background-image: url("${sidebarBackgrounds[iSidebarBackgrounds[1] ?? iSidebarBackgrounds[0]]}");
        }
    `));
"#;

const REGION_LOADER: &str = r#"
bk_loaders.push(() => {
    document.getElementsByTagName("head")[0].appendChild(bk_%NAME%_image);

    for(let i = i%TITLE%Backgrounds.length - 1; i > 0; i--){
        const j = Math.floor(Math.random() * (i + 1));
        [i%TITLE%Backgrounds[i], i%TITLE%Backgrounds[j]] = [i%TITLE%Backgrounds[j], i%TITLE%Backgrounds[i]];
    };

    set%TITLE%Background();
});
"#;

const REGION_ROTATION: &str = r#"
bk_loaders.push(() => {
    setInterval(() => {
        document.body.setAttribute("%NAME%Transition", true);
        setTimeout(() => {
            set%TITLE%Background();
            document.body.setAttribute("%NAME%Transition", false);
        }, 1 * 1000);
    }, %TIME% * 1000);
});
"#;

const CUSTOM_CSS: &str = r#"
bk_global.appendChild(document.createTextNode(%CSS%));
"#;

const INSTALL: &str = r#"
window.addEventListener("load", () => {
    document.getElementsByTagName("head")[0].appendChild(bk_global);
    for(const load of bk_loaders){
        load();
    };
});
"#;

/// Substitutes `%KEY%` tokens in one pass; inserted text is never rescanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let token = after.find('%').map(|end| &after[..end]);

        match token.and_then(|t| values.iter().find(|(key, _)| *key == t)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Escapes a value placed inside a JS template literal.
fn template_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
        .replace(['\r', '\n'], " ")
}

/* =========================
   GENERATION
   ========================= */

/// Resolves every region's sources through the glob resolver.
pub fn resolve_images(config: &BackgroundConfig) -> ResolvedImages {
    let reference = if config.embed_images {
        Reference::DataUri
    } else {
        Reference::FileUrl
    };

    UiRegion::ALL
        .into_iter()
        .map(|region| (region, glob_resolver::resolve(&config.region(region).sources, reference)))
        .collect()
}

fn region_block(region: UiRegion, settings: &RegionSettings, images: &[String], render_above: bool) -> String {
    let name = region.key();
    let title = region.label();
    let selectors = region_selectors(region, render_above);
    let slots = EDITOR_SLOTS.to_string();

    let image_rules = match region {
        UiRegion::Editor => fill(EDITOR_IMAGE_RULES, &[("SLOTS", &slots)]),
        UiRegion::Sidebar => fill(
            SIDEBAR_IMAGE_RULES,
            &[("SIDEBAR", &selectors[0]), ("AUXILIARY", &selectors[1])],
        ),
        _ => fill(
            SINGLE_IMAGE_RULE,
            &[("NAME", name), ("TITLE", title), ("SELECTOR", &selectors[0])],
        ),
    };

    let mut block = fill(
        REGION_STYLE,
        &[
            ("ID", IDENTIFIER),
            ("NAME", name),
            ("TITLE", title),
            ("IMAGES", &images.join(",")),
            ("COUNT", &images.len().to_string()),
            ("SELECTORS", &selectors.join(",\n")),
            ("POSITION", &template_value(&settings.position_css())),
            ("REPEAT", &template_value(&settings.repeat_css())),
            ("SIZE", &template_value(&settings.size_css())),
            ("OPACITY", &number(round(1.0 - settings.opacity, 2))),
            ("BLUR", &template_value(&settings.blur)),
            ("IMAGE_RULES", &image_rules),
        ],
    );
    block.push_str(&fill(REGION_LOADER, &[("NAME", name), ("TITLE", title)]));

    let time = effective_change_time(settings.change_time);
    if time > 0.0 && images.len() > 1 {
        block.push_str(&fill(
            REGION_ROTATION,
            &[("NAME", name), ("TITLE", title), ("TIME", &number(time))],
        ));
    }

    block
}

fn script(config: &BackgroundConfig, images: &ResolvedImages) -> String {
    let render_above = config.render_above;

    let transitions: Vec<String> = UiRegion::ALL
        .into_iter()
        .flat_map(|r| transition_selectors(r, render_above))
        .collect();
    let shared: Vec<String> = UiRegion::ALL
        .into_iter()
        .flat_map(|r| region_selectors(r, render_above))
        .collect();

    let mut code = String::from("(() => {");
    code.push_str(&fill(
        GLOBAL_STYLE,
        &[
            ("ID", IDENTIFIER),
            ("TRANSITIONS", &transitions.join(",\n")),
            ("SHARED", &shared.join(",\n")),
            ("Z_INDEX", if render_above { "" } else { "z-index: 1000;" }),
            ("RENDERING", if config.smooth_rendering { "auto" } else { "pixelated" }),
        ],
    ));

    for region in UiRegion::ALL {
        let Some(list) = images.get(&region).filter(|l| !l.is_empty()) else {
            continue;
        };
        code.push_str(&region_block(region, config.region(region), list, render_above));
    }

    if !config.css.trim().is_empty() {
        code.push_str(&fill(CUSTOM_CSS, &[("CSS", &js_string(&config.css))]));
    }

    code.push_str(INSTALL);
    code.push_str("})();");
    code
}

/// Strips leading spaces on every line and joins the lines.
pub fn minify(code: &str) -> String {
    code.trim().lines().map(|line| line.trim_start_matches(' ')).collect()
}

/// Sentinel-wrapped payload for the given snapshot and resolved images.
pub fn generate(config: &BackgroundConfig, images: &ResolvedImages) -> String {
    format!("{}\n{}\n{}", start_marker(), minify(&script(config, images)), end_marker())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(region: UiRegion, list: &[&str]) -> ResolvedImages {
        let mut map = ResolvedImages::new();
        map.insert(region, list.iter().map(|s| js_string(s)).collect());
        map
    }

    #[test]
    fn rounding_is_decimal() {
        assert_eq!(round(12.345, 2), 12.35);
        assert_eq!(round(1.0 - 0.9, 2), 0.1);
        assert_eq!(round(7.0, 2), 7.0);
    }

    #[test]
    fn change_time_clamp() {
        assert_eq!(effective_change_time(3.0), 5.0);
        assert_eq!(effective_change_time(0.0), 0.0);
        assert_eq!(effective_change_time(12.345), 12.35);
        assert_eq!(effective_change_time(60.0), 60.0);
    }

    #[test]
    fn numbers_print_like_js() {
        assert_eq!(number(5.0), "5");
        assert_eq!(number(0.1), "0.1");
        assert_eq!(number(-0.0), "0");
    }

    #[test]
    fn payload_is_wrapped_in_sentinels() {
        let out = generate(&BackgroundConfig::default(), &ResolvedImages::new());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], start_marker());
        assert_eq!(lines[2], end_marker());
        assert!(lines[1].starts_with("(() => {"));
        assert!(lines[1].ends_with("})();"));
    }

    #[test]
    fn output_is_deterministic() {
        let mut config = BackgroundConfig::default();
        config.region_mut(UiRegion::Editor).change_time = 30.0;
        let imgs = images(UiRegion::Editor, &["https://a/1.png", "https://a/2.png"]);
        assert_eq!(generate(&config, &imgs), generate(&config, &imgs));
    }

    #[test]
    fn regions_without_images_emit_no_rules() {
        let out = generate(&BackgroundConfig::default(), &images(UiRegion::Panel, &["https://a/1.png"]));
        assert!(out.contains("const panelBackgrounds = [\"https://a/1.png\"];"));
        assert!(!out.contains("windowBackgrounds"));
        assert!(!out.contains("setEditorBackground"));
    }

    #[test]
    fn region_rules_use_settings() {
        let mut config = BackgroundConfig::default();
        {
            let window = config.region_mut(UiRegion::Window);
            window.blur = "4px".to_string();
            window.opacity = 0.75;
        }
        let out = generate(&config, &images(UiRegion::Window, &["https://a/1.png"]));
        assert!(out.contains("background-position: center center;"));
        assert!(out.contains("background-repeat: no-repeat;"));
        assert!(out.contains("background-size: cover;"));
        assert!(out.contains("opacity: 0.25;"));
        assert!(out.contains("filter: blur(4px);"));
        assert!(out.contains("body::before {"));
        assert!(out.contains("z-index: 1000;"));
    }

    #[test]
    fn render_above_moves_window_layer() {
        let mut config = BackgroundConfig::default();
        config.render_above = true;
        let out = generate(&config, &images(UiRegion::Window, &["https://a/1.png"]));
        assert!(out.contains("body > div[role=application] > div.monaco-grid-view::after {"));
        assert!(!out.contains("z-index: 1000;"));
        assert!(!out.contains("body::before"));
    }

    #[test]
    fn rotation_requires_interval_and_several_images() {
        let mut config = BackgroundConfig::default();
        config.region_mut(UiRegion::Editor).change_time = 3.0;

        let one = generate(&config, &images(UiRegion::Editor, &["https://a/1.png"]));
        assert!(!one.contains("setInterval"));

        let two = generate(&config, &images(UiRegion::Editor, &["https://a/1.png", "https://a/2.png"]));
        assert!(two.contains("}, 5 * 1000);"));
        assert!(two.contains("setTimeout(() => {setEditorBackground();"));

        config.region_mut(UiRegion::Editor).change_time = 0.0;
        let off = generate(&config, &images(UiRegion::Editor, &["https://a/1.png", "https://a/2.png"]));
        assert!(!off.contains("setInterval"));
    }

    #[test]
    fn sidebar_fills_both_slots() {
        let out = generate(&BackgroundConfig::default(), &images(UiRegion::Sidebar, &["https://a/1.png"]));
        assert!(out.contains("sidebarBackgrounds[iSidebarBackgrounds[0]]"));
        assert!(out.contains("sidebarBackgrounds[iSidebarBackgrounds[1] ?? iSidebarBackgrounds[0]]"));
        assert!(out.contains("#workbench\\\\.parts\\\\.auxiliarybar::after {"));
    }

    #[test]
    fn sidebar_slots_follow_image_count() {
        let one = generate(&BackgroundConfig::default(), &images(UiRegion::Sidebar, &["https://a/1.png"]));
        assert!(one.contains("const sidebarBackgrounds = [\"https://a/1.png\"];"));
        assert!(one.contains("const iSidebarBackgrounds = [...Array(1).keys()];"));

        let two = generate(
            &BackgroundConfig::default(),
            &images(UiRegion::Sidebar, &["https://a/1.png", "https://a/2.png"]),
        );
        assert!(two.contains("const sidebarBackgrounds = [\"https://a/1.png\",\"https://a/2.png\"];"));
        assert!(two.contains("const iSidebarBackgrounds = [...Array(2).keys()];"));
        assert!(two.contains("shuffle(iSidebarBackgrounds);"));

        let slot = |out: &str, index: &str| out.find(&format!("url(\"${{sidebarBackgrounds[{index}]}}\")"));
        for out in [one.as_str(), two.as_str()] {
            let sidebar = slot(out, "iSidebarBackgrounds[0]").unwrap();
            let auxiliary = slot(out, "iSidebarBackgrounds[1] ?? iSidebarBackgrounds[0]").unwrap();
            assert!(sidebar < auxiliary);
        }
    }

    #[test]
    fn manual_values_are_escaped_for_template_literals() {
        let mut config = BackgroundConfig::default();
        {
            let editor = config.region_mut(UiRegion::Editor);
            editor.alignment = crate::data_loaders::config::Alignment::Manual;
            editor.alignment_value = "`${alert(1)}`".to_string();
        }
        let out = generate(&config, &images(UiRegion::Editor, &["https://a/1.png"]));
        assert!(out.contains("background-position: \\`\\${alert(1)}\\`;"));
    }

    #[test]
    fn custom_css_is_a_json_literal() {
        let mut config = BackgroundConfig::default();
        config.css = "body {\n  color: \"red\";\n}".to_string();
        let out = generate(&config, &ResolvedImages::new());
        assert!(out.contains(r#"document.createTextNode("body {\n  color: \"red\";\n}")"#));
    }

    #[test]
    fn fill_does_not_rescan_inserted_values() {
        assert_eq!(fill("%A%-%B%", &[("A", "%B%"), ("B", "x")]), "%B%-x");
        assert_eq!(fill("width: 100%; %A%", &[("A", "1")]), "width: 100%; 1");
    }

    #[test]
    fn minify_strips_indentation_and_newlines() {
        assert_eq!(minify("  a {\n    b;\r\n  }\n"), "a {b;}");
    }
}
