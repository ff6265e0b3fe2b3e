//! A small declarative command-line parser, built the way the original
//! frontend table did it: a static list of flag records (long name, short
//! name, whether it takes a `=value`), matched by prefix against each argv
//! token with leading dashes stripped. Each record can convert at most once;
//! the first argument that matches no record becomes the positional path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing required <file>.p argument")]
    MissingPositional,
    #[error("couldn't parse '{value}' as {kind} for {flag}")]
    BadValue { flag: &'static str, value: String, kind: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagId {
    LtRunGui,
    DisableGui,
    SingleStep,
    OverwriteMemorySize,
    OverwriteOperandSize,
    CacheBits,
    Help,
    Version,
}

struct FlagSpec {
    id: FlagId,
    long: &'static str,
    short: &'static str,
    takes_value: bool,
}

/// `long`/`short` include a trailing `=` for value-taking flags, matching
/// the on-disk table's own convention for distinguishing "takes a value"
/// from "boolean presence flag".
const FLAGS: &[FlagSpec] = &[
    FlagSpec { id: FlagId::LtRunGui, long: "lt-run-gui", short: "ltrg", takes_value: false },
    FlagSpec { id: FlagId::DisableGui, long: "disable-gui", short: "ng", takes_value: false },
    FlagSpec { id: FlagId::SingleStep, long: "singlestep", short: "s", takes_value: false },
    FlagSpec {
        id: FlagId::OverwriteMemorySize,
        long: "overwrite-memory-size=",
        short: "m=",
        takes_value: true,
    },
    FlagSpec {
        id: FlagId::OverwriteOperandSize,
        long: "overwrite-operand-size=",
        short: "o=",
        takes_value: true,
    },
    FlagSpec { id: FlagId::CacheBits, long: "cache-bits=", short: "c=", takes_value: true },
    FlagSpec { id: FlagId::Help, long: "help", short: "h", takes_value: false },
    FlagSpec { id: FlagId::Version, long: "version", short: "v", takes_value: false },
];

pub const DEFAULT_CACHE_BITS: u8 = 4;

/// The parsed, still largely unvalidated command line. Range checks for
/// `overwrite_memory_size`/`overwrite_operand_size`/`cache_bits` live with
/// the consumers that own those ranges (the loader and the cache engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub lt_run_gui: bool,
    pub disable_gui: bool,
    pub singlestep: bool,
    pub overwrite_memory_size: Option<u32>,
    pub overwrite_operand_size: Option<u8>,
    pub cache_bits: u8,
    pub help: bool,
    pub version: bool,
    pub program_path: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            lt_run_gui: false,
            disable_gui: false,
            singlestep: false,
            overwrite_memory_size: None,
            overwrite_operand_size: None,
            cache_bits: DEFAULT_CACHE_BITS,
            help: false,
            version: false,
            program_path: None,
        }
    }
}

fn strip_value(long: &str, short: &str, stripped: &str) -> Option<String> {
    if let Some(real_name) = long.strip_suffix('=') {
        if stripped.starts_with(real_name) {
            return stripped.strip_prefix(real_name).and_then(|s| s.strip_prefix('=')).map(String::from);
        }
    }
    if let Some(real_name) = short.strip_suffix('=') {
        if stripped.starts_with(real_name) {
            return stripped.strip_prefix(real_name).and_then(|s| s.strip_prefix('=')).map(String::from);
        }
    }
    None
}

fn matches_flag(spec: &FlagSpec, stripped: &str) -> bool {
    if spec.takes_value {
        let long_name = spec.long.strip_suffix('=').unwrap_or(spec.long);
        let short_name = spec.short.strip_suffix('=').unwrap_or(spec.short);
        stripped.starts_with(long_name) || stripped.starts_with(short_name)
    } else {
        stripped.starts_with(spec.long) || stripped.starts_with(spec.short)
    }
}

/// Parses `argv` (excluding the program name, i.e. `std::env::args().skip(1)`).
///
/// # Errors
///
/// Returns [`ArgsError::UnknownArgument`] for a token that matches no flag and
/// would be a second positional argument, and [`ArgsError::BadValue`] when a
/// value-taking flag's payload doesn't parse as its declared type.
pub fn parse<I, S>(argv: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = Args::default();
    let mut used = [false; FLAGS.len()];

    for raw in argv {
        let raw = raw.as_ref();
        let stripped = raw.trim_start_matches('-');

        let mut matched = false;
        for (index, spec) in FLAGS.iter().enumerate() {
            if used[index] || !matches_flag(spec, stripped) {
                continue;
            }

            let value = if spec.takes_value {
                strip_value(spec.long, spec.short, stripped).unwrap_or_default()
            } else {
                "true".to_string()
            };

            apply(&mut args, spec.id, &value)?;
            used[index] = true;
            matched = true;
            break;
        }

        if !matched {
            if args.program_path.is_some() {
                return Err(ArgsError::UnknownArgument(raw.to_string()));
            }
            args.program_path = Some(raw.to_string());
        }
    }

    Ok(args)
}

fn apply(args: &mut Args, id: FlagId, value: &str) -> Result<(), ArgsError> {
    match id {
        FlagId::LtRunGui => args.lt_run_gui = parse_bool(value),
        FlagId::DisableGui => args.disable_gui = parse_bool(value),
        FlagId::SingleStep => args.singlestep = parse_bool(value),
        FlagId::Help => args.help = parse_bool(value),
        FlagId::Version => args.version = parse_bool(value),
        FlagId::OverwriteMemorySize => {
            args.overwrite_memory_size = Some(parse_u32("--overwrite-memory-size", value)?);
        }
        FlagId::OverwriteOperandSize => {
            args.overwrite_operand_size = Some(parse_u8("--overwrite-operand-size", value)?);
        }
        FlagId::CacheBits => {
            args.cache_bits = parse_u8("--cache-bits", value)?;
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}

fn parse_u32(flag: &'static str, value: &str) -> Result<u32, ArgsError> {
    value
        .parse()
        .map_err(|_| ArgsError::BadValue { flag, value: value.to_string(), kind: "u32" })
}

fn parse_u8(flag: &'static str, value: &str) -> Result<u8, ArgsError> {
    value
        .parse()
        .map_err(|_| ArgsError::BadValue { flag, value: value.to_string(), kind: "u8" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_flags() {
        let args = parse(["--disable-gui", "--singlestep", "program.p"]).unwrap();
        assert!(args.disable_gui);
        assert!(args.singlestep);
        assert_eq!(args.program_path.as_deref(), Some("program.p"));
    }

    #[test]
    fn parses_short_flags_with_values() {
        let args = parse(["-m=128", "-o=2", "-c=6", "program.p"]).unwrap();
        assert_eq!(args.overwrite_memory_size, Some(128));
        assert_eq!(args.overwrite_operand_size, Some(2));
        assert_eq!(args.cache_bits, 6);
    }

    #[test]
    fn defaults_cache_bits_to_four() {
        let args = parse(["program.p"]).unwrap();
        assert_eq!(args.cache_bits, DEFAULT_CACHE_BITS);
    }

    #[test]
    fn second_positional_is_unknown_argument() {
        let err = parse(["one.p", "two.p"]).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownArgument(ref s) if s == "two.p"));
    }

    #[test]
    fn repeated_flag_is_absorbed_as_positional() {
        // A flag record converts at most once; a second occurrence matches no
        // remaining record and falls through to the positional slot instead.
        let args = parse(["-m=10", "-m=20"]).unwrap();
        assert_eq!(args.overwrite_memory_size, Some(10));
        assert_eq!(args.program_path.as_deref(), Some("-m=20"));
    }

    #[test]
    fn bad_numeric_value_is_an_error() {
        let err = parse(["-c=not-a-number", "program.p"]).unwrap_err();
        assert!(matches!(err, ArgsError::BadValue { flag: "--cache-bits", .. }));
    }

    #[test]
    fn help_and_version_flags_parse() {
        let args = parse(["--help"]).unwrap();
        assert!(args.help);
        let args = parse(["-v"]).unwrap();
        assert!(args.version);
    }
}
