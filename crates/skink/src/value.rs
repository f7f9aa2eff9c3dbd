use std::{
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    error::{RunError, RunResult},
    heap::HeapId,
};

/// Primary value type representing script values at runtime.
///
/// Uses a hybrid design: primitives are stored inline while objects live in
/// the context's heap arena and are referenced via `Object(HeapId)`. Strings
/// are immutable and shared through `Rc`, so cloning a `Value` is always
/// cheap.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Undefined,
    Null,
    Bool(bool),
    /// IEEE-754 double. `-0` and `NaN` are observable per SameValueZero.
    Number(f64),
    Str(JsString),
    /// Exact integer; arithmetic never mixes implicitly with `Number`.
    BigInt(Rc<BigInt>),
    /// Opaque identity; the description lives in the context's symbol
    /// registry.
    Symbol(SymbolId),
    /// Reference to a Scriptable in the heap arena.
    Object(HeapId),
}

impl Value {
    pub fn bool(v: bool) -> Self {
        Self::Bool(v)
    }

    pub fn number(v: f64) -> Self {
        Self::Number(v)
    }

    pub fn str(v: impl Into<JsString>) -> Self {
        Self::Str(v.into())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_object(&self) -> Option<HeapId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// ECMA ToBoolean. Objects are always truthy.
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => !(*n == 0.0 || n.is_nan()),
            Self::Str(s) => !s.as_str().is_empty(),
            Self::BigInt(b) => **b != BigInt::from(0),
            Self::Symbol(_) | Self::Object(_) => true,
        }
    }

    /// ToNumber for primitive values. Objects must be sent through
    /// ToPrimitive first; BigInt refuses implicit conversion.
    pub fn to_number_prim(&self) -> RunResult<f64> {
        match self {
            Self::Undefined => Ok(f64::NAN),
            Self::Null => Ok(0.0),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Number(n) => Ok(*n),
            Self::Str(s) => Ok(string_to_number(s.as_str())),
            Self::BigInt(_) => Err(RunError::type_error("Cannot convert a BigInt value to a number")),
            Self::Symbol(_) => Err(RunError::type_error("Cannot convert a Symbol value to a number")),
            Self::Object(_) => Err(RunError::evaluator_error("ToNumber applied to an object")),
        }
    }

    /// ToString for primitive values. Objects must be sent through
    /// ToPrimitive first; symbols refuse implicit conversion.
    pub fn to_string_prim(&self) -> RunResult<JsString> {
        match self {
            Self::Undefined => Ok(JsString::from("undefined")),
            Self::Null => Ok(JsString::from("null")),
            Self::Bool(true) => Ok(JsString::from("true")),
            Self::Bool(false) => Ok(JsString::from("false")),
            Self::Number(n) => Ok(JsString::from(format_number(*n))),
            Self::Str(s) => Ok(s.clone()),
            Self::BigInt(b) => Ok(JsString::from(b.to_string())),
            Self::Symbol(_) => Err(RunError::type_error("Cannot convert a Symbol value to a string")),
            Self::Object(_) => Err(RunError::evaluator_error("ToString applied to an object")),
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Object(_))
    }
}

/// Strict equality (`===`) for any pair of values. Objects compare by
/// identity, strings by content, numbers by IEEE comparison.
pub(crate) fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x == y,
        _ => false,
    }
}

/// SameValueZero: the Map/Set key relation. Like strict equality except
/// `NaN` equals itself (and `+0` equals `-0`, which `===` already gives).
pub(crate) fn same_value_zero(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        if x.is_nan() && y.is_nan() {
            return true;
        }
    }
    strict_equals(a, b)
}

/// Hash consistent with [`same_value_zero`]: `+0`/`-0` hash alike and `NaN`
/// hashes to a fixed value.
pub(crate) fn same_zero_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    match value {
        Value::Undefined => 0u8.hash(&mut hasher),
        Value::Null => 1u8.hash(&mut hasher),
        Value::Bool(b) => {
            2u8.hash(&mut hasher);
            b.hash(&mut hasher);
        }
        Value::Number(n) => {
            3u8.hash(&mut hasher);
            let bits = if n.is_nan() {
                f64::NAN.to_bits()
            } else if *n == 0.0 {
                0
            } else {
                n.to_bits()
            };
            bits.hash(&mut hasher);
        }
        Value::Str(s) => {
            4u8.hash(&mut hasher);
            s.as_str().hash(&mut hasher);
        }
        Value::BigInt(b) => {
            5u8.hash(&mut hasher);
            b.hash(&mut hasher);
        }
        Value::Symbol(id) => {
            6u8.hash(&mut hasher);
            id.0.hash(&mut hasher);
        }
        Value::Object(id) => {
            7u8.hash(&mut hasher);
            id.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Loose equality (`==`) for primitive pairs. Object operands must be
/// reduced with ToPrimitive by the caller first.
pub(crate) fn loose_equals_prim(a: &Value, b: &Value) -> RunResult<bool> {
    use Value as V;
    Ok(match (a, b) {
        (V::Undefined | V::Null, V::Undefined | V::Null) => true,
        (V::Number(_), V::Number(_))
        | (V::Str(_), V::Str(_))
        | (V::Bool(_), V::Bool(_))
        | (V::BigInt(_), V::BigInt(_))
        | (V::Symbol(_), V::Symbol(_)) => strict_equals(a, b),
        (V::Number(x), V::Str(s)) | (V::Str(s), V::Number(x)) => *x == string_to_number(s.as_str()),
        (V::Bool(_), _) => loose_equals_prim(&V::Number(a.to_number_prim()?), b)?,
        (_, V::Bool(_)) => loose_equals_prim(a, &V::Number(b.to_number_prim()?))?,
        (V::BigInt(big), V::Number(n)) | (V::Number(n), V::BigInt(big)) => {
            n.fract() == 0.0 && n.is_finite() && BigInt::from(*n as i64) == **big && n.abs() < 9e18
        }
        (V::BigInt(big), V::Str(s)) | (V::Str(s), V::BigInt(big)) => {
            s.as_str().trim().parse::<BigInt>().is_ok_and(|parsed| parsed == **big)
        }
        _ => false,
    })
}

/// ECMA ToNumber for strings: whitespace-trimmed, radix prefixes honored,
/// empty string is zero, anything unparseable is NaN.
pub(crate) fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u128::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return u128::from_str_radix(oct, 8).map_or(f64::NAN, |v| v as f64);
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return u128::from_str_radix(bin, 2).map_or(f64::NAN, |v| v as f64);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            // Rust's float parser accepts "inf"/"nan" spellings the
            // language does not.
            if t.bytes().any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E')) {
                f64::NAN
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
    }
}

/// ECMA Number-to-String. Integral values below 1e21 print without a
/// decimal point; very large and very small magnitudes switch to the
/// `1e+21` / `1e-7` exponential forms.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    let abs = n.abs();
    if n.fract() == 0.0 && abs < 1e21 {
        return format!("{n:.0}");
    }
    let mut buffer = ryu::Buffer::new();
    let mut out = buffer.format(n).to_owned();
    // ryu prints `1e300`; the language prints `1e+300`.
    if let Some(e_pos) = out.find('e') {
        if out.as_bytes().get(e_pos + 1) != Some(&b'-') {
            out.insert(e_pos + 1, '+');
        }
    } else if out.ends_with(".0") {
        out.truncate(out.len() - 2);
    }
    out
}

/// ToInt32 per ECMA: modular wrap into the signed 32-bit range.
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulus = 2f64.powi(32);
    let mut m = n.trunc() % modulus;
    if m < 0.0 {
        m += modulus;
    }
    if m >= 2f64.powi(31) {
        (m - modulus) as i32
    } else {
        m as i32
    }
}

/// ToUint32 per ECMA.
pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulus = 2f64.powi(32);
    let mut m = n.trunc() % modulus;
    if m < 0.0 {
        m += modulus;
    }
    m as u32
}

/// Converts a BigInt to f64 for explicit `Number(bigint)` conversion.
pub(crate) fn bigint_to_f64(b: &BigInt) -> f64 {
    b.to_f64().unwrap_or(f64::NAN)
}

/// Canonical array index: a string that round-trips through u32 without
/// leading zeros (and is not `4294967295`).
pub(crate) fn as_array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    let value: u32 = key.parse().ok()?;
    if value == u32::MAX {
        return None;
    }
    Some(value)
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Immutable script string.
///
/// Backed by UTF-8 `Rc<str>` storage, with indexed operations (`length`,
/// `charAt`, `charCodeAt`, slicing) defined over UTF-16 code units as the
/// language requires. The code-unit length is computed on demand; for ASCII
/// strings it equals the byte length and costs nothing.
#[derive(Debug, Clone)]
pub(crate) struct JsString(Rc<str>);

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rc(&self) -> Rc<str> {
        Rc::clone(&self.0)
    }

    /// Length in UTF-16 code units, the script-visible `length`.
    pub fn utf16_len(&self) -> usize {
        if self.0.is_ascii() {
            self.0.len()
        } else {
            self.0.encode_utf16().count()
        }
    }

    /// Code unit at `index`, or `None` when out of range.
    pub fn code_unit_at(&self, index: usize) -> Option<u16> {
        if self.0.is_ascii() {
            self.0.as_bytes().get(index).map(|b| u16::from(*b))
        } else {
            self.0.encode_utf16().nth(index)
        }
    }

    /// Substring by UTF-16 code-unit range, clamped to the string. Unpaired
    /// surrogates created by splitting a pair are replaced, which keeps the
    /// storage valid UTF-8.
    pub fn utf16_slice(&self, start: usize, end: usize) -> JsString {
        if self.0.is_ascii() {
            let len = self.0.len();
            let start = start.min(len);
            let end = end.clamp(start, len);
            return JsString::from(&self.0[start..end]);
        }
        let units: Vec<u16> = self.0.encode_utf16().collect();
        let len = units.len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        JsString::from(String::from_utf16_lossy(&units[start..end]))
    }

    /// Maps a UTF-16 code-unit index to the corresponding byte offset, for
    /// search results that must be reported in code units.
    pub fn byte_to_utf16_index(&self, byte_index: usize) -> usize {
        if self.0.is_ascii() {
            byte_index
        } else {
            self.0[..byte_index].encode_utf16().count()
        }
    }
}

impl PartialEq for JsString {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for JsString {}

impl Hash for JsString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        Self(Rc::from(s))
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        Self(Rc::from(s))
    }
}

impl From<Rc<str>> for JsString {
    fn from(s: Rc<str>) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// Opaque symbol identity. Well-known symbols occupy the low ids in every
/// context; `Symbol()` and `Symbol.for()` allocate upwards from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SymbolId(pub u32);

/// `Symbol.iterator`, consulted by `for…of` and spread.
pub(crate) const SYM_ITERATOR: SymbolId = SymbolId(0);
/// `Symbol.toPrimitive`, consulted by ToPrimitive before valueOf/toString.
pub(crate) const SYM_TO_PRIMITIVE: SymbolId = SymbolId(1);
/// `Symbol.isConcatSpreadable`, consulted by `Array.prototype.concat`.
pub(crate) const SYM_IS_CONCAT_SPREADABLE: SymbolId = SymbolId(2);
/// First id available for user-created symbols.
pub(crate) const FIRST_USER_SYMBOL: u32 = 3;

/// Registry of live symbols for one context.
#[derive(Debug)]
pub(crate) struct SymbolRegistry {
    descriptions: Vec<Option<Rc<str>>>,
    /// `Symbol.for` registrations, key to id.
    registered: Vec<(Rc<str>, SymbolId)>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            descriptions: vec![
                Some(Rc::from("Symbol.iterator")),
                Some(Rc::from("Symbol.toPrimitive")),
                Some(Rc::from("Symbol.isConcatSpreadable")),
            ],
            registered: Vec::new(),
        }
    }

    pub fn create(&mut self, description: Option<Rc<str>>) -> SymbolId {
        let id = SymbolId(self.descriptions.len() as u32);
        self.descriptions.push(description);
        id
    }

    /// `Symbol.for`: one identity per key per registry.
    pub fn for_key(&mut self, key: Rc<str>) -> SymbolId {
        if let Some((_, id)) = self.registered.iter().find(|(k, _)| *k == key) {
            return *id;
        }
        let id = self.create(Some(Rc::clone(&key)));
        self.registered.push((key, id));
        id
    }

    pub fn description(&self, id: SymbolId) -> Option<&str> {
        self.descriptions.get(id.0 as usize).and_then(|d| d.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-42.0), "-42");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn same_value_zero_relation() {
        assert!(same_value_zero(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(same_value_zero(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(!strict_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert_eq!(
            same_zero_hash(&Value::Number(0.0)),
            same_zero_hash(&Value::Number(-0.0))
        );
        assert_eq!(
            same_zero_hash(&Value::Number(f64::NAN)),
            same_zero_hash(&Value::Number(-f64::NAN))
        );
    }

    #[test]
    fn string_to_number_rules() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("12px").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn utf16_code_unit_addressing() {
        let s = JsString::from("a\u{1F600}b");
        // The emoji is a surrogate pair, so the script-visible length is 4.
        assert_eq!(s.utf16_len(), 4);
        assert_eq!(s.code_unit_at(0), Some(u16::from(b'a')));
        assert_eq!(s.code_unit_at(1), Some(0xD83D));
        assert_eq!(s.code_unit_at(2), Some(0xDE00));
        assert_eq!(s.code_unit_at(3), Some(u16::from(b'b')));
        assert_eq!(s.utf16_slice(3, 4).as_str(), "b");
    }

    #[test]
    fn array_index_normalization() {
        assert_eq!(as_array_index("0"), Some(0));
        assert_eq!(as_array_index("42"), Some(42));
        assert_eq!(as_array_index("042"), None);
        assert_eq!(as_array_index("-1"), None);
        assert_eq!(as_array_index("4294967295"), None);
        assert_eq!(as_array_index("x"), None);
    }
}
