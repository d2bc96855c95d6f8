use crate::{Error, Result};

/// A readable stream of big-endian binary data.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    /// The underlying data of the reader.
    data: &'a [u8],
    /// The current offset in bytes. Is not guaranteed to be in range.
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Create a new readable stream of binary data.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Create a new readable stream of binary data at a specific position.
    #[inline]
    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        Self { data, offset }
    }

    /// Returns the current offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Try to read `T` from the data.
    #[inline]
    pub fn read<T: Structure<'a>>(&mut self) -> Result<T> {
        T::read(self)
    }

    /// Read a certain number of bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or_else(truncated)?;
        let v = self.data.get(self.offset..end).ok_or_else(truncated)?;
        self.offset = end;
        Ok(v)
    }

    /// Try to read a vector of `T` from the data.
    pub fn read_vector<T: Structure<'a>>(&mut self, count: usize) -> Result<Vec<T>> {
        let mut res = Vec::with_capacity(count.min(self.data.len()));
        for _ in 0..count {
            res.push(self.read::<T>()?);
        }
        Ok(res)
    }

    /// Skip the next `n` bytes from the stream.
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Jump to a specific location.
    #[inline]
    pub fn jump(&mut self, offset: usize) {
        self.offset = offset;
    }
}

fn truncated() -> Error {
    Error::CorruptData("unexpected end of table data".into())
}

/// A writable stream of big-endian binary data.
pub struct Writer(Vec<u8>);

impl Writer {
    /// Create a new writable stream of binary data.
    #[inline]
    pub fn new() -> Self {
        Self(Vec::with_capacity(1024))
    }

    /// Create a new writable stream of binary data with a capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Write `T` into the data.
    #[inline]
    pub fn write<'a, T: Structure<'a>>(&mut self, data: T) {
        data.write(self);
    }

    /// Write all elements of a slice.
    pub fn write_vector<'a, T: Structure<'a>>(&mut self, data: &[T]) {
        for el in data {
            el.write(self);
        }
    }

    /// Give bytes into the writer.
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Align the contents to a byte boundary.
    #[inline]
    pub fn align(&mut self, to: usize) {
        while self.0.len() % to != 0 {
            self.0.push(0);
        }
    }

    /// The number of written bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return the written bytes.
    #[inline]
    pub fn finish(self) -> Vec<u8> {
        self.0
    }
}

/// A fixed-layout binary structure that can be read and written.
pub trait Structure<'a>: Sized {
    /// Read self at the current position of the reader.
    fn read(r: &mut Reader<'a>) -> Result<Self>;

    /// Write self into the writer.
    fn write(&self, w: &mut Writer);

    /// Read self at the given offset in the data.
    fn read_at(data: &'a [u8], offset: usize) -> Result<Self> {
        Self::read(&mut Reader::new_at(data, offset))
    }
}

impl<const N: usize> Structure<'_> for [u8; N] {
    fn read(r: &mut Reader) -> Result<Self> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(r.read_bytes(N)?);
        Ok(bytes)
    }

    fn write(&self, w: &mut Writer) {
        w.extend(self)
    }
}

macro_rules! primitive {
    ($($ty:ty),*) => {$(
        impl Structure<'_> for $ty {
            fn read(r: &mut Reader) -> Result<Self> {
                r.read::<[u8; std::mem::size_of::<$ty>()]>().map(Self::from_be_bytes)
            }

            fn write(&self, w: &mut Writer) {
                w.extend(&self.to_be_bytes());
            }
        }
    )*};
}

primitive!(u8, u16, i16, u32, i32, i64);

/// A signed 2.14 fixed-point number, kept in its raw form.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct F2Dot14(pub i16);

impl F2Dot14 {
    /// The value as a float.
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 16384.0
    }
}

impl Structure<'_> for F2Dot14 {
    fn read(r: &mut Reader) -> Result<Self> {
        r.read::<i16>().map(Self)
    }

    fn write(&self, w: &mut Writer) {
        w.write::<i16>(self.0)
    }
}
