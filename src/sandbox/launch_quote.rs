//! Windows command-line and environment-block construction.
//!
//! CreateProcess takes a single string; recovering an argv from it follows
//! the documented quoting convention and nothing else.
//!
//! See "Everyone quotes command line arguments the wrong way":
//!   https://learn.microsoft.com/en-us/archive/blogs/twistylittlepassagesallalike/everyone-quotes-command-line-arguments-the-wrong-way

use std::ffi::{OsStr, OsString};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use super::error::LaunchError;

const QUOTE: u16 = '"' as u16;
const BACKSLASH: u16 = '\\' as u16;

/// Build the full command line: the quoted image path followed by each
/// argument, individually escaped, NUL-terminated for CreateProcessW.
pub fn build_command_line(image: &Path, args: &[OsString]) -> Result<Vec<u16>, LaunchError> {
    let mut out = Vec::new();
    append_quoted(&mut out, image.as_os_str())?;
    for arg in args {
        out.push(' ' as u16);
        append_quoted(&mut out, arg)?;
    }
    out.push(0);
    Ok(out)
}

/// Every value gets wrapped in quotes whether it needs them or not; the
/// parse result is identical and it keeps the escaping rules in one branch.
fn append_quoted(out: &mut Vec<u16>, value: &OsStr) -> Result<(), LaunchError> {
    out.push(QUOTE);
    let mut backslashes = 0usize;
    for unit in value.encode_wide() {
        match unit {
            0 => return Err(LaunchError::InvalidArgument),
            BACKSLASH => backslashes += 1,
            QUOTE => {
                // 2n+1 backslashes before a quote: n literal backslashes and
                // an escaped quote that does not toggle quoting.
                for _ in 0..(backslashes * 2 + 1) {
                    out.push(BACKSLASH);
                }
                out.push(QUOTE);
                backslashes = 0;
            }
            other => {
                // Backslashes not followed by a quote are literal.
                for _ in 0..backslashes {
                    out.push(BACKSLASH);
                }
                out.push(other);
                backslashes = 0;
            }
        }
    }
    // A trailing run doubles so the closing quote stays a metacharacter.
    for _ in 0..(backslashes * 2) {
        out.push(BACKSLASH);
    }
    out.push(QUOTE);
    Ok(())
}

/// Encode environment pairs as the sorted, double-NUL-terminated Unicode
/// block CreateProcessW expects with CREATE_UNICODE_ENVIRONMENT.
/// Callers must not pass duplicate keys; Windows requires unique keys and
/// this function does not detect duplicates.
pub fn encode_env_block(env: &[(OsString, OsString)]) -> Result<Vec<u16>, LaunchError> {
    if env.is_empty() {
        // The block terminator alone; the loop below never emits it.
        return Ok(vec![0, 0]);
    }
    let mut pairs: Vec<&(OsString, OsString)> = env.iter().collect();
    pairs.sort_by_key(|(key, _)| key.to_string_lossy().to_lowercase());

    let mut block = Vec::new();
    for (key, value) in pairs {
        push_checked(&mut block, key)?;
        block.push('=' as u16);
        push_checked(&mut block, value)?;
        block.push(0);
    }
    block.push(0);
    Ok(block)
}

fn push_checked(block: &mut Vec<u16>, value: &OsStr) -> Result<(), LaunchError> {
    for unit in value.encode_wide() {
        if unit == 0 {
            return Err(LaunchError::InvalidArgument);
        }
        block.push(unit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::windows::ffi::OsStringExt;

    fn utf16_to_string(vec: &[u16]) -> String {
        String::from_utf16(vec).expect("valid UTF-16")
    }

    fn quoted(image: &str, args: &[&str]) -> String {
        let args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let out = build_command_line(Path::new(image), &args).expect("quoting should succeed");
        utf16_to_string(&out)
    }

    #[test]
    fn image_is_always_quoted() {
        assert_eq!(quoted("prog.exe", &[]), "\"prog.exe\"\0");
    }

    #[test]
    fn plain_argument_still_quoted() {
        assert_eq!(quoted("prog.exe", &["foo"]), "\"prog.exe\" \"foo\"\0");
    }

    #[test]
    fn space_survives_quoting() {
        assert_eq!(quoted("prog.exe", &["a b"]), "\"prog.exe\" \"a b\"\0");
    }

    #[test]
    fn empty_argument_keeps_its_slot() {
        assert_eq!(quoted("prog.exe", &["", "x"]), "\"prog.exe\" \"\" \"x\"\0");
    }

    #[test]
    fn embedded_quote_is_escaped() {
        // a"b parses back as a"b
        assert_eq!(quoted("prog.exe", &["a\"b"]), "\"prog.exe\" \"a\\\"b\"\0");
    }

    #[test]
    fn backslash_then_quote_doubles_the_run() {
        // a\"b: one backslash before the quote becomes 2*1+1 backslashes.
        assert_eq!(
            quoted("prog.exe", &["a\\\"b"]),
            "\"prog.exe\" \"a\\\\\\\"b\"\0"
        );
    }

    #[test]
    fn interior_backslashes_stay_literal() {
        assert_eq!(
            quoted("prog.exe", &["a\\\\b"]),
            "\"prog.exe\" \"a\\\\b\"\0"
        );
    }

    #[test]
    fn trailing_backslashes_are_doubled() {
        // a\ inside quotes must not escape the closing quote.
        assert_eq!(quoted("prog.exe", &["a\\"]), "\"prog.exe\" \"a\\\\\"\0");
        assert_eq!(
            quoted("prog.exe", &["a\\\\"]),
            "\"prog.exe\" \"a\\\\\\\\\"\0"
        );
    }

    #[test]
    fn image_with_spaces_is_quoted() {
        assert_eq!(
            quoted(r"C:\pro gram\p.exe", &["x"]),
            "\"C:\\pro gram\\p.exe\" \"x\"\0"
        );
    }

    #[test]
    fn nul_in_argument_is_rejected() {
        let arg = OsString::from_wide(&['a' as u16, 0, 'b' as u16]);
        let err = build_command_line(Path::new("prog.exe"), &[arg])
            .expect_err("NUL should be rejected");
        assert!(matches!(err, LaunchError::InvalidArgument));
    }

    #[test]
    fn env_block_is_sorted_and_double_terminated() {
        let block = encode_env_block(&[
            (OsString::from("FOO"), OsString::from("BAR")),
            (OsString::from("baz"), OsString::from("QUX")),
        ])
        .expect("encoding should succeed");
        // Case-insensitive sort puts baz before FOO.
        let expected: Vec<u16> = "baz=QUX\0FOO=BAR\0\0".encode_utf16().collect();
        assert_eq!(block, expected);
    }

    #[test]
    fn empty_env_is_just_the_terminator() {
        assert_eq!(encode_env_block(&[]).expect("empty block"), vec![0, 0]);
    }

    #[test]
    fn nul_in_env_value_is_rejected() {
        let err = encode_env_block(&[(
            OsString::from("KEY"),
            OsString::from_wide(&['x' as u16, 0]),
        )])
        .expect_err("NUL should be rejected");
        assert!(matches!(err, LaunchError::InvalidArgument));
    }
}
