//! Formatted input parsing in the manner of `sscanf`.
//!
//! Supported directives:
//!
//! | Directive | Input | Argument |
//! |-----------|-------|----------|
//! | `%d` | signed decimal | [`ScanArg::Int`] |
//! | `%i` | signed, base from prefix (`0x` hex, `0` octal) | [`ScanArg::Int`] |
//! | `%u` | unsigned decimal | [`ScanArg::Uint`] |
//! | `%x` | unsigned hex, optional `0x` | [`ScanArg::Uint`] |
//! | `%f` | decimal float with optional exponent | [`ScanArg::Float`] |
//! | `%s` | run of non-whitespace | [`ScanArg::Str`] |
//! | `%c` | one byte, whitespace not skipped | [`ScanArg::Char`] |
//! | `%%` | literal `%` | - |
//!
//! A field width (`%3d`) bounds the characters consumed, `*` (`%*d`) parses
//! without assigning, and `h`/`l` length modifiers are accepted and ignored.
//! Whitespace in the format skips any amount of input whitespace; any other
//! character must match literally.

use core::str;

use crate::driver::error::{IoError, IoResult};

/// Destination of one conversion
#[derive(Debug)]
pub enum ScanArg<'a> {
    /// `%d`, `%i`
    Int(&'a mut i32),
    /// `%u`, `%x`
    Uint(&'a mut u32),
    /// `%f`
    Float(&'a mut f32),
    /// `%s`: bytes are stored in `buf`, their count in `len`
    Str {
        /// Destination bytes; the token is cut at its length
        buf: &'a mut [u8],
        /// Number of bytes stored
        len: &'a mut usize,
    },
    /// `%c`
    Char(&'a mut u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Dec,
    Auto,
    Unsigned,
    Hex,
    Float,
    Str,
    Char,
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume bytes while `accept(index_in_token, byte)` holds, up to `width`
    fn take_while<F>(&mut self, width: usize, mut accept: F) -> &'a [u8]
    where
        F: FnMut(usize, u8) -> bool,
    {
        let start = self.pos;
        while self.pos - start < width {
            match self.peek() {
                Some(b) if accept(self.pos - start, b) => self.pos += 1,
                _ => break,
            }
        }
        &self.input[start..self.pos]
    }
}

/// Parse `input` against `format`, assigning into `args` in order
///
/// Returns the number of arguments assigned, which is smaller than the number
/// of conversions when the input stops matching early.
///
/// # Errors
/// - `Format` - the input ended before the first conversion, the format
///   contains an unknown directive, or an argument has the wrong type or is
///   missing
pub fn scan(input: &[u8], format: &str, args: &mut [ScanArg<'_>]) -> IoResult<usize> {
    let mut cursor = Cursor { input, pos: 0 };
    let mut fmt = format.as_bytes().iter().copied().peekable();
    let mut next_arg = 0usize;
    let mut assigned = 0usize;
    let mut converted = false;

    while let Some(f) = fmt.next() {
        if f.is_ascii_whitespace() {
            cursor.skip_whitespace();
            continue;
        }

        if f != b'%' {
            if cursor.peek() != Some(f) {
                break;
            }
            cursor.pos += 1;
            continue;
        }

        // Directive
        let mut suppress = false;
        if fmt.peek() == Some(&b'*') {
            suppress = true;
            fmt.next();
        }

        let mut width = 0usize;
        while let Some(d) = fmt.peek().copied().filter(u8::is_ascii_digit) {
            width = width.saturating_mul(10).saturating_add(usize::from(d - b'0'));
            fmt.next();
        }
        let width = if width == 0 { usize::MAX } else { width };

        while matches!(fmt.peek(), Some(b'h' | b'l')) {
            fmt.next();
        }

        let conversion = match fmt.next() {
            Some(b'%') => {
                cursor.skip_whitespace();
                if cursor.peek() != Some(b'%') {
                    break;
                }
                cursor.pos += 1;
                continue;
            }
            Some(b'd') => Conversion::Dec,
            Some(b'i') => Conversion::Auto,
            Some(b'u') => Conversion::Unsigned,
            Some(b'x' | b'X') => Conversion::Hex,
            Some(b'f' | b'e' | b'g') => Conversion::Float,
            Some(b's') => Conversion::Str,
            Some(b'c') => Conversion::Char,
            _ => return Err(IoError::Format),
        };

        if conversion != Conversion::Char {
            cursor.skip_whitespace();
        }
        if cursor.at_end() {
            if !converted {
                return Err(IoError::Format);
            }
            break;
        }

        let target = if suppress {
            None
        } else {
            let arg = args.get_mut(next_arg).ok_or(IoError::Format)?;
            next_arg += 1;
            Some(arg)
        };

        if !convert(&mut cursor, conversion, width, target)? {
            break;
        }
        converted = true;
        if !suppress {
            assigned += 1;
        }
    }

    Ok(assigned)
}

/// Run one conversion. Returns `Ok(false)` on a matching failure.
fn convert(
    cursor: &mut Cursor<'_>,
    conversion: Conversion,
    width: usize,
    target: Option<&mut ScanArg<'_>>,
) -> IoResult<bool> {
    match conversion {
        Conversion::Dec | Conversion::Auto => {
            let Some(value) = scan_signed(cursor, width, conversion == Conversion::Auto) else {
                return Ok(false);
            };
            match target {
                Some(ScanArg::Int(out)) => **out = value,
                Some(_) => return Err(IoError::Format),
                None => {}
            }
        }
        Conversion::Unsigned | Conversion::Hex => {
            let radix = if conversion == Conversion::Hex { 16 } else { 10 };
            let Some(value) = scan_unsigned(cursor, width, radix) else {
                return Ok(false);
            };
            match target {
                Some(ScanArg::Uint(out)) => **out = value,
                Some(_) => return Err(IoError::Format),
                None => {}
            }
        }
        Conversion::Float => {
            let Some(value) = scan_float(cursor, width) else {
                return Ok(false);
            };
            match target {
                Some(ScanArg::Float(out)) => **out = value,
                Some(_) => return Err(IoError::Format),
                None => {}
            }
        }
        Conversion::Str => {
            let token = cursor.take_while(width, |_, b| !b.is_ascii_whitespace());
            match target {
                Some(ScanArg::Str { buf, len }) => {
                    let count = token.len().min(buf.len());
                    buf[..count].copy_from_slice(&token[..count]);
                    **len = count;
                }
                Some(_) => return Err(IoError::Format),
                None => {}
            }
        }
        Conversion::Char => {
            let Some(byte) = cursor.peek() else {
                return Ok(false);
            };
            cursor.pos += 1;
            match target {
                Some(ScanArg::Char(out)) => **out = byte,
                Some(_) => return Err(IoError::Format),
                None => {}
            }
        }
    }
    Ok(true)
}

fn scan_signed(cursor: &mut Cursor<'_>, width: usize, auto_radix: bool) -> Option<i32> {
    let start = cursor.pos;
    let sign = cursor.take_while(width.min(1), |_, b| b == b'+' || b == b'-');
    let negative = sign == b"-";
    let width = width.saturating_sub(sign.len());

    let radix = if auto_radix { detect_radix(cursor, width) } else { 10 };
    let prefix = prefix_len(cursor, radix, width);
    cursor.pos += prefix;
    let width = width.saturating_sub(prefix);

    let digits = cursor.take_while(width, |_, b| (b as char).is_digit(radix));
    if digits.is_empty() {
        cursor.pos = start;
        return None;
    }
    let magnitude = u32::from_str_radix(str::from_utf8(digits).ok()?, radix).ok()?;
    let value = if negative {
        0i32.wrapping_sub_unsigned(magnitude)
    } else {
        magnitude as i32
    };
    Some(value)
}

fn scan_unsigned(cursor: &mut Cursor<'_>, width: usize, radix: u32) -> Option<u32> {
    let start = cursor.pos;
    let sign = cursor.take_while(width.min(1), |_, b| b == b'+');
    let width = width.saturating_sub(sign.len());

    let prefix = prefix_len(cursor, radix, width);
    cursor.pos += prefix;
    let width = width.saturating_sub(prefix);

    let digits = cursor.take_while(width, |_, b| (b as char).is_digit(radix));
    if digits.is_empty() {
        cursor.pos = start;
        return None;
    }
    u32::from_str_radix(str::from_utf8(digits).ok()?, radix).ok()
}

fn scan_float(cursor: &mut Cursor<'_>, width: usize) -> Option<f32> {
    let start = cursor.pos;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut prev = 0u8;
    let token = cursor.take_while(width, |i, b| {
        let ok = match b {
            b'0'..=b'9' => true,
            b'+' | b'-' => i == 0 || prev == b'e' || prev == b'E',
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            b'e' | b'E' if !seen_exp && i > 0 => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        prev = b;
        ok
    });

    let parsed = str::from_utf8(token).ok().and_then(|s| s.parse::<f32>().ok());
    if parsed.is_none() {
        cursor.pos = start;
    }
    parsed
}

/// Radix for `%i`: `0x` hex, leading `0` octal, otherwise decimal
fn detect_radix(cursor: &Cursor<'_>, width: usize) -> u32 {
    let rest = &cursor.input[cursor.pos..];
    match rest {
        [b'0', b'x' | b'X', d, ..] if width >= 3 && d.is_ascii_hexdigit() => 16,
        [b'0', ..] => 8,
        _ => 10,
    }
}

/// Length of a `0x` prefix to skip for hex input
fn prefix_len(cursor: &Cursor<'_>, radix: u32, width: usize) -> usize {
    if radix != 16 || width < 3 {
        return 0;
    }
    match &cursor.input[cursor.pos..] {
        [b'0', b'x' | b'X', d, ..] if d.is_ascii_hexdigit() => 2,
        _ => 0,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
