use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::ConfigError;
use super::ini::{Config, Section};

#[derive(Parser)]
#[grammar = "config/ini.pest"]
struct IniParser;

pub(super) fn parse_ini(file: &str, path: Option<&str>) -> Result<Config, ConfigError> {
    // editors on windows like to prepend a byte order mark
    let file = file.strip_prefix('\u{feff}').unwrap_or(file);

    let mut pairs = IniParser::parse(Rule::INI, file).map_err(|e| {
        let e = match path {
            Some(p) => e.with_path(p),
            None => e,
        };
        ConfigError::Syntax(e.to_string())
    })?;

    let mut config = Config::default();

    let Some(ini) = pairs.next() else {
        return Ok(config);
    };

    // indentation of the current line
    let mut indent = 0;
    // false until the current line has something other than blanks
    let mut has_content = true;
    // key the next indented line continues, with the indentation of its line
    let mut current: Option<(String, usize)> = None;

    for p in ini.into_inner() {
        match p.as_rule() {
            Rule::INDENT => {
                // a blank line ends the value
                if !has_content {
                    current = None;
                }
                indent = p.as_str().len();
                has_content = false;
            }
            Rule::COMMENT => has_content = true,
            Rule::SECTION => {
                has_content = true;
                current = None;

                let (line, _) = p.line_col();
                let name = parse_section(p);

                if config.section(&name).is_some() {
                    return Err(ConfigError::DuplicateSection {
                        section: name,
                        line,
                    });
                }

                config.sections.push(Section::new(name, line));
            }
            Rule::KEY_VALUE | Rule::TEXT => {
                has_content = true;

                let (line, _) = p.line_col();

                // deeper indentation than the key continues its value
                if let Some((key, key_indent)) = &current {
                    if indent > *key_indent {
                        if let Some(section) = config.sections.last_mut() {
                            section.append(key, p.as_str().trim());
                        }
                        continue;
                    }
                }

                if p.as_rule() == Rule::TEXT {
                    let location = match path {
                        Some(path) => format!("{}:{}", path, line),
                        None => format!("line {}", line),
                    };
                    return Err(ConfigError::Syntax(format!(
                        "{}: expected 'key = value', found '{}'",
                        location,
                        p.as_str().trim()
                    )));
                }

                let (key, value) = parse_key_value(p);

                // a key must belong to a section
                let Some(section) = config.sections.last_mut() else {
                    return Err(ConfigError::KeyOutsideSection { key, line });
                };

                if section.contains_key(&key) {
                    return Err(ConfigError::DuplicateKey {
                        section: section.name.clone(),
                        key,
                        line,
                    });
                }

                let key = key.to_ascii_lowercase();
                section.values.insert(key.clone(), value);
                current = Some((key, indent));
            }
            Rule::EOI => break,
            _ => unreachable!(),
        }
    }

    return Ok(config);
}

fn parse_section(pair: Pair<Rule>) -> String {
    let name = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::SECTION_NAME)
        .map(|p| p.as_str().trim().to_string());

    return name.unwrap_or_default();
}

fn parse_key_value(pair: Pair<Rule>) -> (String, String) {
    let mut key = String::new();
    let mut value = String::new();

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::KEY => key = p.as_str().trim().to_string(),
            Rule::VALUE => value = p.as_str().trim().to_string(),
            _ => unreachable!(),
        }
    }

    return (key, value);
}

#[cfg(test)]
const EXAMPLE_INI: &str = "\
# spoolbridge configuration

[Spoolman]
SPOOLMAN_URL = http://192.168.1.20:7912/api/v1/filament/
timeout: 7

[Klipper]
; where the slicer uploads its files
GCODE_PATH = /home/pi/printer_data/gcodes

[Moonraker]
MOONRAKER_URL = http://localhost:7125
";

#[test]
fn test_example_ini() {
    let config = parse_ini(EXAMPLE_INI, None).unwrap();

    assert_eq!(config.sections.len(), 3);
    assert_eq!(
        config.get("Spoolman", "SPOOLMAN_URL"),
        Some("http://192.168.1.20:7912/api/v1/filament/")
    );
    assert_eq!(config.get("Spoolman", "TIMEOUT"), Some("7"));
    assert_eq!(
        config.get("Klipper", "gcode_path"),
        Some("/home/pi/printer_data/gcodes")
    );
    assert_eq!(config.section("Klipper").unwrap().len(), 1);
    assert_eq!(config.section("Moonraker").unwrap().line, 11);
}

#[test]
fn test_crlf_and_empty_value() {
    let config = parse_ini("[Klipper]\r\nGCODE_PATH =\r\nEXTRA = a = b  \r\n", None).unwrap();

    assert_eq!(config.get("Klipper", "GCODE_PATH"), Some(""));
    // only the first separator splits
    assert_eq!(config.get("Klipper", "extra"), Some("a = b"));
}

#[test]
fn test_continuation_lines() {
    let config = parse_ini(
        "[Moonraker]\n\
         MACRO_NAME = _FILAMENT_INFO\n\
         \x20 EXTRA = a = b\n\
         \t# comments do not end the value\n\
         \tlast line\n\
         \n\
         MOONRAKER_URL = http://localhost:7125\n",
        None,
    )
    .unwrap();

    assert_eq!(
        config.get("Moonraker", "MACRO_NAME"),
        Some("_FILAMENT_INFO\nEXTRA = a = b\nlast line")
    );
    assert!(config.get("Moonraker", "EXTRA").is_none());
    assert_eq!(
        config.get("Moonraker", "MOONRAKER_URL"),
        Some("http://localhost:7125")
    );

    // after a blank line an indented key is a key again
    let config = parse_ini("[Spoolman]\nA = 1\n\n  B = 2\n", None).unwrap();
    assert_eq!(config.get("Spoolman", "A"), Some("1"));
    assert_eq!(config.get("Spoolman", "B"), Some("2"));

    // keys with the same indentation are siblings
    let config = parse_ini("[Spoolman]\n  A = 1\n  B = 2\n", None).unwrap();
    assert_eq!(config.get("Spoolman", "A"), Some("1"));
    assert_eq!(config.get("Spoolman", "B"), Some("2"));

    // nothing to continue after a section header
    assert!(matches!(
        parse_ini("[Spoolman]\n  dangling\n", None),
        Err(ConfigError::Syntax(_))
    ));
}

#[test]
fn test_section_names_are_case_sensitive() {
    let config = parse_ini("[spoolman]\nSPOOLMAN_URL = http://x/\n", None).unwrap();

    assert!(config.section("Spoolman").is_none());
    assert!(matches!(
        config.require("Spoolman", "SPOOLMAN_URL"),
        Err(ConfigError::MissingSection(_))
    ));
}

#[test]
fn test_key_outside_section() {
    let re = parse_ini("SPOOLMAN_URL = http://x/\n[Spoolman]\n", None);

    assert!(matches!(
        re,
        Err(ConfigError::KeyOutsideSection { line: 1, .. })
    ));
}

#[test]
fn test_duplicates() {
    let re = parse_ini("[Spoolman]\n[Klipper]\n[Spoolman]\n", None);
    assert!(matches!(
        re,
        Err(ConfigError::DuplicateSection { line: 3, .. })
    ));

    let re = parse_ini("[Spoolman]\nurl = a\nURL = b\n", None);
    assert!(matches!(re, Err(ConfigError::DuplicateKey { line: 3, .. })));
}

#[test]
fn test_syntax_error() {
    let re = parse_ini("[Spoolman]\nthis line has no separator\n", Some("config.ini"));

    match re {
        Err(ConfigError::Syntax(message)) => assert!(message.contains("config.ini")),
        other => panic!("expected a syntax error, got {:?}", other),
    }

    assert!(parse_ini("[Spoolman\n", None).is_err());
}
