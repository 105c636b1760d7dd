//! Xorshift stream with skip-ahead.
//!
//! Marsaglia's 64-bit xorshift generator ("Xorshift RNGs", 2003) with the
//! (13, 17, 5) triple. It is fast and small, and nowhere near
//! cryptographically strong. The only thing we need from it is a
//! reproducible sequence that can be repositioned cheaply.

/// Below this many steps `skip` walks the sequence directly.
const MATRIX_SKIP_THRESHOLD: u64 = 256;

/// Internal state of the xorshift generator.
///
/// # Example
///
/// ```
/// use wgprng::XorShift;
///
/// let mut a = XorShift::from_seed(2113);
/// let mut b = XorShift::from_seed(2113);
///
/// a.skip(99);
/// for _ in 0..99 {
///     b.next();
/// }
/// assert_eq!(a.next(), b.next());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorShift {
    state: u64,
}

#[inline(always)]
const fn step(mut state: u64) -> u64 {
    state ^= state << 13;
    state ^= state >> 17;
    state ^= state << 5;
    state
}

impl XorShift {
    /// Creates a stream positioned at `seed`.
    ///
    /// A zero seed is a fixed point of the transform: every output is 0.
    #[must_use]
    pub const fn from_seed(seed: u64) -> Self {
        XorShift { state: seed }
    }

    /// Advances the state by one transform and returns its high 32 bits.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u32 {
        self.state = step(self.state);
        (self.state >> 32) as u32
    }

    /// Advances the state by exactly `n` transforms, discarding the outputs.
    ///
    /// This only repositions the stream; the value at the new position is
    /// produced by the following call to [`next()`](Self::next).
    pub fn skip(&mut self, n: u64) {
        if n < MATRIX_SKIP_THRESHOLD {
            self.state = skip_linear(self.state, n);
        } else {
            self.state = Gf2Matrix::transform().pow(n).apply(self.state);
        }
    }

    /// Raw 64-bit state.
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }
}

fn skip_linear(mut state: u64, n: u64) -> u64 {
    for _ in 0..n {
        state = step(state);
    }
    state
}

/// A 64x64 matrix over GF(2). Column `j` holds the image of bit `j`.
///
/// The xorshift transform is linear over GF(2), so n applications of it
/// are a single matrix power.
#[derive(Clone, Copy)]
struct Gf2Matrix([u64; 64]);

impl Gf2Matrix {
    fn identity() -> Self {
        let mut cols = [0_u64; 64];
        for (j, col) in cols.iter_mut().enumerate() {
            *col = 1 << j;
        }
        Gf2Matrix(cols)
    }

    fn transform() -> Self {
        let mut cols = [0_u64; 64];
        for (j, col) in cols.iter_mut().enumerate() {
            *col = step(1 << j);
        }
        Gf2Matrix(cols)
    }

    #[inline]
    fn apply(&self, mut v: u64) -> u64 {
        let mut out = 0;
        while v != 0 {
            out ^= self.0[v.trailing_zeros() as usize];
            v &= v - 1;
        }
        out
    }

    /// Returns `self ∘ other`.
    fn compose(&self, other: &Self) -> Self {
        let mut cols = [0_u64; 64];
        for (col, src) in cols.iter_mut().zip(other.0.iter()) {
            *col = self.apply(*src);
        }
        Gf2Matrix(cols)
    }

    fn pow(self, mut n: u64) -> Self {
        let mut result = Self::identity();
        let mut base = self;
        while n > 0 {
            if n & 1 == 1 {
                result = base.compose(&result);
            }
            base = base.compose(&base);
            n >>= 1;
        }
        result
    }
}
