//! Fractional-indexing order keys.
//!
//! Keys are base-62 strings ordered by plain byte comparison. A key is an
//! integer part followed by an optional fraction. The integer part's head
//! character encodes its digit count: 'a' through 'z' cover ascending
//! non-negative magnitudes (1 to 26 digits), 'Z' down to 'A' cover the
//! negative range. "a0" is the zero key. Fractions never end in '0', so
//! every value has exactly one spelling and midpoints always exist.

use crate::error::KeyError;
use crate::types::OrderKey;

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// First key handed out in an empty sibling group
pub const FIRST_KEY: &str = "a0";

/// Smallest representable integer part; reserved, never a valid key
const SMALLEST_INTEGER: &str = "A00000000000000000000000000";

fn digit_index(d: u8) -> Result<usize, KeyError> {
    DIGITS
        .iter()
        .position(|&c| c == d)
        .ok_or_else(|| KeyError::MalformedKey(format!("invalid digit '{}'", d as char)))
}

/// Total length of an integer part with the given head character
fn integer_length(head: u8) -> Result<usize, KeyError> {
    match head {
        b'a'..=b'z' => Ok((head - b'a') as usize + 2),
        b'A'..=b'Z' => Ok((b'Z' - head) as usize + 2),
        _ => Err(KeyError::MalformedKey(format!(
            "invalid integer head '{}'",
            head as char
        ))),
    }
}

/// Integer part of a key (head plus fixed digit run); the rest is the fraction
fn integer_part(key: &str) -> Result<&str, KeyError> {
    let head = *key
        .as_bytes()
        .first()
        .ok_or_else(|| KeyError::MalformedKey("empty key".to_string()))?;
    let len = integer_length(head)?;
    if len > key.len() {
        return Err(KeyError::MalformedKey(key.to_string()));
    }
    Ok(&key[..len])
}

fn validate_integer(int: &str) -> Result<(), KeyError> {
    let head = *int
        .as_bytes()
        .first()
        .ok_or_else(|| KeyError::MalformedKey("empty integer part".to_string()))?;
    if int.len() != integer_length(head)? {
        return Err(KeyError::MalformedKey(int.to_string()));
    }
    Ok(())
}

/// Check that a key is well formed: valid integer part, base-62 digits only,
/// fraction not ending in '0', and not the reserved smallest integer.
pub fn validate_key(key: &str) -> Result<(), KeyError> {
    if key == SMALLEST_INTEGER {
        return Err(KeyError::MalformedKey(key.to_string()));
    }
    let int = integer_part(key)?;
    for d in key.bytes().skip(1) {
        digit_index(d)?;
    }
    let fraction = &key[int.len()..];
    if fraction.ends_with('0') {
        return Err(KeyError::MalformedKey(key.to_string()));
    }
    Ok(())
}

/// Next integer above `int`, or None at the top of the key space
fn increment_integer(int: &str) -> Result<Option<OrderKey>, KeyError> {
    validate_integer(int)?;
    let head = int.as_bytes()[0];
    let mut digits: Vec<u8> = int.as_bytes()[1..].to_vec();
    let mut carry = true;
    for d in digits.iter_mut().rev() {
        let i = digit_index(*d)? + 1;
        if i == DIGITS.len() {
            *d = DIGITS[0];
        } else {
            *d = DIGITS[i];
            carry = false;
            break;
        }
    }
    if carry {
        if head == b'Z' {
            return Ok(Some("a0".to_string()));
        }
        if head == b'z' {
            return Ok(None);
        }
        let next = head + 1;
        if next > b'a' {
            digits.push(DIGITS[0]);
        } else {
            digits.pop();
        }
        let mut out = String::with_capacity(1 + digits.len());
        out.push(next as char);
        out.push_str(std::str::from_utf8(&digits).map_err(|_| KeyError::Exhausted)?);
        return Ok(Some(out));
    }
    let mut out = String::with_capacity(int.len());
    out.push(head as char);
    out.push_str(std::str::from_utf8(&digits).map_err(|_| KeyError::Exhausted)?);
    Ok(Some(out))
}

/// Next integer below `int`, or None at the bottom of the key space
fn decrement_integer(int: &str) -> Result<Option<OrderKey>, KeyError> {
    validate_integer(int)?;
    let head = int.as_bytes()[0];
    let max_digit = *DIGITS.last().unwrap_or(&b'z');
    let mut digits: Vec<u8> = int.as_bytes()[1..].to_vec();
    let mut borrow = true;
    for d in digits.iter_mut().rev() {
        let i = digit_index(*d)?;
        if i == 0 {
            *d = max_digit;
        } else {
            *d = DIGITS[i - 1];
            borrow = false;
            break;
        }
    }
    if borrow {
        if head == b'a' {
            let mut out = String::with_capacity(2);
            out.push('Z');
            out.push(max_digit as char);
            return Ok(Some(out));
        }
        if head == b'A' {
            return Ok(None);
        }
        let prev = head - 1;
        if prev < b'Z' {
            digits.push(max_digit);
        } else {
            digits.pop();
        }
        let mut out = String::with_capacity(1 + digits.len());
        out.push(prev as char);
        out.push_str(std::str::from_utf8(&digits).map_err(|_| KeyError::Exhausted)?);
        return Ok(Some(out));
    }
    let mut out = String::with_capacity(int.len());
    out.push(head as char);
    out.push_str(std::str::from_utf8(&digits).map_err(|_| KeyError::Exhausted)?);
    Ok(Some(out))
}

/// Fraction strictly between fraction `a` and fraction `b` (open end when
/// `b` is None). Both inputs carry no trailing '0'; neither does the result.
fn midpoint(a: &str, b: Option<&str>) -> Result<OrderKey, KeyError> {
    if let Some(b) = b {
        if a >= b {
            return Err(KeyError::InvertedRange {
                left: a.to_string(),
                right: b.to_string(),
            });
        }
    }
    if a.ends_with('0') || b.is_some_and(|b| b.ends_with('0')) {
        return Err(KeyError::MalformedKey("trailing zero fraction".to_string()));
    }
    if let Some(b) = b {
        // Strip the longest common prefix, treating `a` as padded with '0'.
        let mut n = 0;
        let ab = a.as_bytes();
        let bb = b.as_bytes();
        while n < bb.len() && ab.get(n).copied().unwrap_or(b'0') == bb[n] {
            n += 1;
        }
        if n > 0 {
            let rest = midpoint(a.get(n..).unwrap_or(""), Some(&b[n..]))?;
            let mut out = String::with_capacity(n + rest.len());
            out.push_str(&b[..n]);
            out.push_str(&rest);
            return Ok(out);
        }
    }
    let digit_a = match a.as_bytes().first() {
        Some(&d) => digit_index(d)?,
        None => 0,
    };
    let digit_b = match b {
        Some(b) => digit_index(b.as_bytes()[0])?,
        None => DIGITS.len(),
    };
    if digit_b - digit_a > 1 {
        let mid = (digit_a + digit_b + 1) / 2;
        return Ok((DIGITS[mid] as char).to_string());
    }
    // Adjacent first digits: reuse b's head when it has room, else extend a.
    match b {
        Some(b) if b.len() > 1 => Ok(b[..1].to_string()),
        _ => {
            let rest = midpoint(a.get(1..).unwrap_or(""), None)?;
            let mut out = String::with_capacity(1 + rest.len());
            out.push(DIGITS[digit_a] as char);
            out.push_str(&rest);
            Ok(out)
        }
    }
}

/// One key strictly between `left` and `right`, either side open when None.
/// `key_between(None, None)` yields the zero key "a0".
pub fn key_between(left: Option<&str>, right: Option<&str>) -> Result<OrderKey, KeyError> {
    if let Some(a) = left {
        validate_key(a)?;
    }
    if let Some(b) = right {
        validate_key(b)?;
    }
    if let (Some(a), Some(b)) = (left, right) {
        if a >= b {
            return Err(KeyError::InvertedRange {
                left: a.to_string(),
                right: b.to_string(),
            });
        }
    }
    let a = match left {
        Some(a) => a,
        None => {
            let b = match right {
                Some(b) => b,
                None => return Ok(FIRST_KEY.to_string()),
            };
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ib == SMALLEST_INTEGER {
                let mut out = ib.to_string();
                out.push_str(&midpoint("", Some(fb))?);
                return Ok(out);
            }
            if ib < b {
                return Ok(ib.to_string());
            }
            // The integer below may be the reserved bottom; extend it with a
            // fraction instead of handing out the reserved spelling.
            return match decrement_integer(ib)? {
                Some(i) if i != SMALLEST_INTEGER => Ok(i),
                Some(_) => {
                    let mut out = SMALLEST_INTEGER.to_string();
                    out.push_str(&midpoint("", None)?);
                    Ok(out)
                }
                None => Err(KeyError::Exhausted),
            };
        }
    };
    let ia = integer_part(a)?;
    let fa = &a[ia.len()..];
    let b = match right {
        Some(b) => b,
        None => {
            return match increment_integer(ia)? {
                Some(i) => Ok(i),
                None => {
                    let mut out = ia.to_string();
                    out.push_str(&midpoint(fa, None)?);
                    Ok(out)
                }
            };
        }
    };
    let ib = integer_part(b)?;
    let fb = &b[ib.len()..];
    if ia == ib {
        let mut out = ia.to_string();
        out.push_str(&midpoint(fa, Some(fb))?);
        return Ok(out);
    }
    match increment_integer(ia)? {
        Some(i) if i.as_str() < b => Ok(i),
        _ => {
            let mut out = ia.to_string();
            out.push_str(&midpoint(fa, None)?);
            Ok(out)
        }
    }
}

/// `n` keys strictly between `left` and `right`, mutually ascending.
/// The single multi-sibling allocator: placement, child promotion, and
/// reconciler insertion all go through here.
pub fn keys_between(
    left: Option<&str>,
    right: Option<&str>,
    n: usize,
) -> Result<Vec<OrderKey>, KeyError> {
    match n {
        0 => Ok(Vec::new()),
        1 => Ok(vec![key_between(left, right)?]),
        _ => {
            if right.is_none() {
                let mut out = Vec::with_capacity(n);
                let mut cursor = key_between(left, None)?;
                for _ in 1..n {
                    let next = key_between(Some(&cursor), None)?;
                    out.push(cursor);
                    cursor = next;
                }
                out.push(cursor);
                return Ok(out);
            }
            if left.is_none() {
                let mut out = Vec::with_capacity(n);
                let mut cursor = key_between(None, right)?;
                for _ in 1..n {
                    let prev = key_between(None, Some(&cursor))?;
                    out.push(cursor);
                    cursor = prev;
                }
                out.push(cursor);
                out.reverse();
                return Ok(out);
            }
            // Bounded range: split around a midpoint and recurse.
            let mid = n / 2;
            let center = key_between(left, right)?;
            let mut out = keys_between(left, Some(&center), mid)?;
            let upper = keys_between(Some(&center), right, n - mid - 1)?;
            out.push(center);
            out.extend(upper);
            Ok(out)
        }
    }
}
