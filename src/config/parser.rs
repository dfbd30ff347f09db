use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Config, TimeoutRule};
use crate::{sdebug, swarn};
use crate::scopes::Scope;

/// Parse the config rooted at `path`, following `source = <glob>` includes.
///
/// Mirrors the original Hyprlang-backed grammar: flat `key = value` lines,
/// `category { ... }` blocks, and repeatable anonymous `listener { ... }`
/// blocks. Each file is canonicalized and tracked on an include stack; a
/// `source` directive that would revisit a file already on that stack is
/// skipped with a warning rather than failing the whole config load.
pub fn parse(path: &Path) -> Result<Config, String> {
    let mut cfg = Config::default();
    let mut stack = HashSet::new();
    parse_file(path, &mut cfg, &mut stack)?;
    validate(&cfg)
}

fn validate(cfg: &Config) -> Result<Config, String> {
    if cfg.rules.is_empty() {
        return Err("no rules configured".to_string());
    }
    Ok(cfg.clone())
}

fn parse_file(path: &Path, cfg: &mut Config, stack: &mut HashSet<PathBuf>) -> Result<(), String> {
    let canonical = fs::canonicalize(path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    if !stack.insert(canonical.clone()) {
        swarn!(
            Scope::Config.to_string(),
            "include cycle detected at {}, skipping",
            path.display()
        );
        return Ok(());
    }

    let text = fs::read_to_string(&canonical)
        .map_err(|e| format!("{}: {e}", canonical.display()))?;

    let mut lines = Lines::new(&text);
    parse_block(&mut lines, cfg, None, &canonical, stack)?;

    stack.remove(&canonical);
    Ok(())
}

/// Parses statements until EOF (top level) or a closing `}` (nested block).
/// `category` is `None` at top level, `Some("general")` etc. inside a named
/// block, and `Some("listener")` inside an anonymous listener block (in
/// which case a fresh `TimeoutRule` is being accumulated into `cfg.rules`
/// by the caller once this returns).
fn parse_block(
    lines: &mut Lines,
    cfg: &mut Config,
    category: Option<&str>,
    base_dir_of: &Path,
    stack: &mut HashSet<PathBuf>,
) -> Result<Option<TimeoutRule>, String> {
    let mut rule = category
        .filter(|c| *c == "listener")
        .map(|_| TimeoutRule {
            timeout_sec: 0,
            on_timeout: None,
            on_resume: None,
            ignore_inhibit: false,
        });
    let mut saw_timeout = false;

    while let Some(stmt) = lines.next_statement() {
        match stmt {
            Statement::Close => {
                if category.is_none() {
                    return Err(format!("unexpected `}}` at line {}", lines.lineno));
                }
                break;
            }
            Statement::BlockOpen(name) => {
                if category.is_some() {
                    return Err(format!(
                        "nested blocks are not supported (line {})",
                        lines.lineno
                    ));
                }
                if name == "listener" {
                    let parsed = parse_block(lines, cfg, Some("listener"), base_dir_of, stack)?;
                    let r = parsed.expect("listener block always yields a rule");
                    if r.timeout_sec == 0 {
                        swarn!(Scope::Config.to_string(), "listener block missing timeout, skipping");
                    } else {
                        cfg.rules.push(r);
                    }
                } else {
                    parse_block(lines, cfg, Some(name.as_str()), base_dir_of, stack)?;
                }
            }
            Statement::KeyValue(key, value) => {
                match category {
                    None if key == "source" => {
                        include_glob(&value, base_dir_of, cfg, stack)?;
                    }
                    None => {
                        return Err(format!(
                            "unexpected top-level key `{key}` (line {})",
                            lines.lineno
                        ));
                    }
                    Some("general") => apply_general(&mut cfg.general, &key, &value)?,
                    Some("listener") => {
                        let r = rule.as_mut().expect("listener rule present");
                        match key.as_str() {
                            "timeout" => {
                                r.timeout_sec = value
                                    .parse()
                                    .map_err(|_| format!("listener:timeout must be an integer, got `{value}`"))?;
                                saw_timeout = true;
                            }
                            "on-timeout" => r.on_timeout = non_empty(value),
                            "on-resume" => r.on_resume = non_empty(value),
                            "ignore_inhibit" => r.ignore_inhibit = parse_bool(&value)?,
                            other => swarn!(
                                Scope::Config.to_string(),
                                "unknown listener key `{}`, ignoring",
                                other
                            ),
                        }
                    }
                    Some(other) => swarn!(
                        Scope::Config.to_string(),
                        "unknown category `{}`, ignoring key `{}`",
                        other,
                        key
                    ),
                }
            }
        }
    }

    let _ = saw_timeout; // a zero/absent timeout is caught by the caller via `timeout_sec == 0`
    Ok(rule)
}

fn include_glob(
    pattern: &str,
    base_dir_of: &Path,
    cfg: &mut Config,
    stack: &mut HashSet<PathBuf>,
) -> Result<(), String> {
    let base_dir = base_dir_of.parent().unwrap_or_else(|| Path::new("."));
    let full_pattern = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        base_dir.join(pattern).to_string_lossy().into_owned()
    };

    let mut matched = 0;
    for entry in glob::glob(&full_pattern).map_err(|e| format!("source = {pattern}: {e}"))? {
        let entry = entry.map_err(|e| format!("source = {pattern}: {e}"))?;
        sdebug!(Scope::Config.to_string(), "including {}", entry.display());
        parse_file(&entry, cfg, stack)?;
        matched += 1;
    }
    if matched == 0 {
        swarn!(Scope::Config.to_string(), "source = {} matched no files", pattern);
    }
    Ok(())
}

fn apply_general(general: &mut crate::config::model::GeneralConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "lock_cmd" => general.lock_cmd = non_empty(value.to_string()),
        "unlock_cmd" => general.unlock_cmd = non_empty(value.to_string()),
        "on_lock_cmd" => general.on_lock_cmd = non_empty(value.to_string()),
        "on_unlock_cmd" => general.on_unlock_cmd = non_empty(value.to_string()),
        "before_sleep_cmd" => general.before_sleep_cmd = non_empty(value.to_string()),
        "after_sleep_cmd" => general.after_sleep_cmd = non_empty(value.to_string()),
        "ignore_dbus_inhibit" => general.ignore_dbus_inhibit = parse_bool(value)?,
        "ignore_systemd_inhibit" => general.ignore_systemd_inhibit = parse_bool(value)?,
        "ignore_wayland_inhibit" => general.ignore_wayland_inhibit = parse_bool(value)?,
        "inhibit_sleep" => {
            let raw: u8 = value
                .parse()
                .map_err(|_| format!("general:inhibit_sleep must be an integer, got `{value}`"))?;
            general.set_inhibit_sleep(raw)?;
        }
        other => swarn!(Scope::Config.to_string(), "unknown general key `{}`, ignoring", other),
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(format!("expected 0/1/true/false, got `{other}`")),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

enum Statement {
    KeyValue(String, String),
    BlockOpen(String),
    Close,
}

struct Lines<'a> {
    remaining: std::str::Lines<'a>,
    lineno: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self { remaining: text.lines(), lineno: 0 }
    }

    fn next_statement(&mut self) -> Option<Statement> {
        loop {
            let raw = self.remaining.next()?;
            self.lineno += 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if line == "}" {
                return Some(Statement::Close);
            }
            if let Some(name) = line.strip_suffix('{') {
                return Some(Statement::BlockOpen(name.trim().to_string()));
            }
            if let Some((key, value)) = line.split_once('=') {
                return Some(Statement::KeyValue(
                    key.trim().to_string(),
                    value.trim().to_string(),
                ));
            }
            // A bare category name on its own line followed by `{` on the
            // next line is not supported; every block opener must end in `{`.
            return Some(Statement::KeyValue(line.to_string(), String::new()));
        }
    }
}

fn strip_comment(line: &str) -> &str {
    if let Some(idx) = line.find('#') {
        return &line[..idx];
    }
    if let Some(idx) = line.find("//") {
        return &line[..idx];
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("idlewarden-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_basic_config() {
        let path = write_tmp(
            "basic.conf",
            r#"
            general {
                lock_cmd = hyprlock
                inhibit_sleep = 2
            }
            listener {
                timeout = 150
                on-timeout = hyprlock
            }
            listener {
                timeout = 300
                on-timeout = systemctl suspend
                on-resume = notify-send resumed
            }
            "#,
        );
        let cfg = parse(&path).unwrap();
        assert_eq!(cfg.general.lock_cmd.as_deref(), Some("hyprlock"));
        assert_eq!(cfg.rules.len(), 2);
        assert_eq!(cfg.rules[0].timeout_sec, 150);
        assert_eq!(cfg.rules[1].on_resume.as_deref(), Some("notify-send resumed"));
    }

    #[test]
    fn rejects_empty_rule_set() {
        let path = write_tmp("empty.conf", "general {\n  lock_cmd = hyprlock\n}\n");
        let err = parse(&path).unwrap_err();
        assert!(err.contains("no rules configured"));
    }

    #[test]
    fn skips_listener_missing_timeout() {
        let path = write_tmp(
            "missing-timeout.conf",
            "listener {\n  on-timeout = hyprlock\n}\nlistener {\n  timeout = 10\n}\n",
        );
        let cfg = parse(&path).unwrap();
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].timeout_sec, 10);
    }

    #[test]
    fn skips_include_cycle_and_still_loads_rest_of_config() {
        let a = write_tmp(
            "a.conf",
            "source = b.conf\nlistener {\n  timeout = 10\n}\n",
        );
        let _b = write_tmp("b.conf", "source = a.conf\n");
        let cfg = parse(&a).unwrap();
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].timeout_sec, 10);
    }
}
