use crate::error::DecodeError;

/// A read-only cursor over a decode buffer.
///
/// `Wire::decode` implementations advance `pos` as they consume bytes;
/// nothing here ever looks past `buf.len()`.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Take the next `n` bytes, or fail if fewer than `n` remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn take_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }
}

/// A value that can be written to and read from the smolrpc wire format,
/// and that knows its own canonical signature-string rendering.
///
/// Integers are fixed-width big-endian two's complement. Composites are
/// built inductively: a sequence is a `u64` length followed by elements, a
/// variant is a `u8` discriminant followed by the chosen branch, a tuple or
/// struct is just the concatenation of its fields. See the module-level
/// grammar in [`type_name`](Wire::type_name) for how these show up in
/// method signatures.
pub trait Wire: Sized {
    fn encode(&self, out: &mut Vec<u8>);
    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError>;

    /// The canonical type-name string used in method signatures, e.g.
    /// `uint64_t`, `vec<byte>`, `variant<uint8_t, string>`.
    fn type_name() -> String;
}

/// Encode a top-level value to a fresh buffer.
pub fn encode<T: Wire>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode(&mut out);
    out
}

/// Decode a top-level value from a buffer, erroring on any trailing bytes.
pub fn decode<T: Wire>(buf: &[u8]) -> Result<T, DecodeError> {
    let mut cur = Cursor::new(buf);
    let value = T::decode(&mut cur)?;
    if !cur.is_empty() {
        return Err(DecodeError::TrailingBytes {
            remaining: cur.remaining(),
        });
    }
    Ok(value)
}

macro_rules! impl_wire_int {
    ($ty:ty, $name:literal) => {
        impl Wire for $ty {
            fn encode(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
                let bytes = cur.take(std::mem::size_of::<$ty>())?;
                Ok(<$ty>::from_be_bytes(bytes.try_into().unwrap()))
            }

            fn type_name() -> String {
                $name.to_string()
            }
        }
    };
}

impl_wire_int!(u8, "uint8_t");
impl_wire_int!(u16, "uint16_t");
impl_wire_int!(u32, "uint32_t");
impl_wire_int!(u64, "uint64_t");
impl_wire_int!(i8, "int8_t");
impl_wire_int!(i16, "int16_t");
impl_wire_int!(i32, "int32_t");
impl_wire_int!(i64, "int64_t");

/// `bool` is not a primitive of the wire algebra (per spec); it is encoded
/// as a single byte and rendered in signatures as `uint8_t`, same as any
/// other one-byte unsigned integer.
impl Wire for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(if *self { 1 } else { 0 });
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        Ok(cur.take_u8()? != 0)
    }

    fn type_name() -> String {
        u8::type_name()
    }
}

/// An opaque 8-bit unit, distinct from `uint8_t`: the element type of raw
/// byte sequences (`vec<byte>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct Byte(pub u8);

impl Wire for Byte {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.0);
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        Ok(Byte(cur.take_u8()?))
    }

    fn type_name() -> String {
        "byte".to_string()
    }
}

/// `()` renders as `void` and contributes no bytes.
impl Wire for () {
    fn encode(&self, _out: &mut Vec<u8>) {}

    fn decode(_cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        Ok(())
    }

    fn type_name() -> String {
        "void".to_string()
    }
}

/// Length-prefixed, not UTF-8 validated on decode: a permissive decode
/// never errors on invalid byte sequences, it just replaces them.
impl Wire for String {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u64).encode(out);
        out.extend_from_slice(self.as_bytes());
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let len = u64::decode(cur)? as usize;
        let bytes = cur.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn type_name() -> String {
        "string".to_string()
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u64).encode(out);
        for item in self {
            item.encode(out);
        }
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let len = u64::decode(cur)? as usize;
        let mut items = Vec::with_capacity(len.min(1 << 20));
        for _ in 0..len {
            items.push(T::decode(cur)?);
        }
        Ok(items)
    }

    fn type_name() -> String {
        format!("vec<{}>", T::type_name())
    }
}

impl<T: Wire, const N: usize> Wire for [T; N] {
    fn encode(&self, out: &mut Vec<u8>) {
        for item in self {
            item.encode(out);
        }
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        // std::array::try_from_fn is not stable on our MSRV; build in a Vec.
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode(cur)?);
        }
        Ok(items
            .try_into()
            .unwrap_or_else(|_| panic!("array decode produced wrong length")))
    }

    fn type_name() -> String {
        format!("array<{}, {}>", T::type_name(), N)
    }
}

/// A two-element pair, distinct from a 2-tuple in the signature grammar
/// (`pair<A,B>` vs. `tuple<A,B>`); both encode identically as the
/// concatenation of their fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pair<A, B>(pub A, pub B);

impl<A: Wire, B: Wire> Wire for Pair<A, B> {
    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out);
        self.1.encode(out);
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        Ok(Pair(A::decode(cur)?, B::decode(cur)?))
    }

    fn type_name() -> String {
        format!("pair<{}, {}>", A::type_name(), B::type_name())
    }
}

macro_rules! impl_wire_tuple {
    ($($idx:tt $T:ident),+) => {
        impl<$($T: Wire),+> Wire for ($($T,)+) {
            fn encode(&self, out: &mut Vec<u8>) {
                $(self.$idx.encode(out);)+
            }

            fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
                Ok(($($T::decode(cur)?,)+))
            }

            fn type_name() -> String {
                let parts: Vec<String> = vec![$($T::type_name()),+];
                format!("tuple<{}>", parts.join(", "))
            }
        }
    };
}

impl_wire_tuple!(0 A);
impl_wire_tuple!(0 A, 1 B);
impl_wire_tuple!(0 A, 1 B, 2 C);
impl_wire_tuple!(0 A, 1 B, 2 C, 3 D);
impl_wire_tuple!(0 A, 1 B, 2 C, 3 D, 4 E);

/// Option<T> is the two-branch variant `variant<void, T>`: discriminant 0
/// is `None`, discriminant 1 carries a `T`.
impl<T: Wire> Wire for Option<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            None => 0u8.encode(out),
            Some(value) => {
                1u8.encode(out);
                value.encode(out);
            }
        }
    }

    fn decode(cur: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        match cur.take_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(cur)?)),
            found => Err(DecodeError::InvalidDiscriminant {
                found,
                variant_count: 2,
            }),
        }
    }

    fn type_name() -> String {
        format!("variant<void, {}>", T::type_name())
    }
}

/// Signature-string helper for a method with return type `R` and argument
/// types rendered by `arg_type_names`: `R(A, B, ...)`.
pub fn function_signature(return_type_name: &str, arg_type_names: &[String]) -> String {
    format!("{return_type_name}({})", arg_type_names.join(", "))
}
