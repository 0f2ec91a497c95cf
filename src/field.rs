//! Fields, i.e. values assigned to the degrees of freedom of a discretization.

use nalgebra as na;

use crate::error::{Result, WaveError};

/// Version tag of a discretization.
///
/// A new generation is created every time the mesh is adapted.
/// Fields and operators carry the generation they were built for,
/// and mixing generations is an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u32);

impl Generation {
    /// The generation following this one.
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A vector of values indexed by degree of freedom,
/// tagged with the discretization generation it belongs to.
///
/// Fields are usually created by methods on
/// [`Discretization`][crate::Discretization] such as
/// [`new_zero_field`][crate::Discretization::new_zero_field]
/// and [`interpolate`][crate::Discretization::interpolate].
#[derive(Clone)]
pub struct Field {
    /// The underlying vector of values, exposed for convenience.
    ///
    /// Changing its length will make every operation
    /// on this field fail with [`WaveError::InvalidStateSize`].
    pub values: na::DVector<f64>,
    generation: Generation,
}

impl Field {
    /// Wrap a vector of values.
    #[inline]
    pub fn from_values(values: na::DVector<f64>, generation: Generation) -> Self {
        Self { values, generation }
    }

    /// A field of zeros.
    #[inline]
    pub fn zeros(len: usize, generation: Generation) -> Self {
        Self::from_values(na::DVector::zeros(len), generation)
    }

    /// The generation this field belongs to.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of degrees of freedom.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the field has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that this field can be used with a discretization
    /// of the given generation and size.
    pub fn check(&self, generation: Generation, len: usize) -> Result<()> {
        if self.generation != generation {
            return Err(WaveError::StaleGeneration {
                expected: generation,
                actual: self.generation,
            });
        }
        if self.len() != len {
            return Err(WaveError::InvalidStateSize {
                expected: len,
                actual: self.len(),
            });
        }
        Ok(())
    }

    /// Euclidean inner product with another field of the same generation.
    #[inline]
    pub fn dot(&self, other: &Self) -> f64 {
        debug_assert_eq!(self.generation, other.generation);
        self.values.dot(&other.values)
    }
}

//
// formatting and vector arithmetic
//

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "field of generation {}, values {:?}",
            self.generation, self.values
        )
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.values == other.values
    }
}

// Add

impl std::ops::Add for Field {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        debug_assert_eq!(self.generation, rhs.generation);
        Field::from_values(self.values + rhs.values, self.generation)
    }
}

impl std::ops::Add<&Field> for Field {
    type Output = Self;

    fn add(self, rhs: &Field) -> Self::Output {
        debug_assert_eq!(self.generation, rhs.generation);
        Field::from_values(self.values + &rhs.values, self.generation)
    }
}

// AddAssign

impl std::ops::AddAssign for Field {
    fn add_assign(&mut self, rhs: Self) {
        debug_assert_eq!(self.generation, rhs.generation);
        self.values += rhs.values;
    }
}

impl std::ops::AddAssign<&Field> for Field {
    fn add_assign(&mut self, rhs: &Field) {
        debug_assert_eq!(self.generation, rhs.generation);
        self.values += &rhs.values;
    }
}

// SubAssign

impl std::ops::SubAssign for Field {
    fn sub_assign(&mut self, rhs: Self) {
        debug_assert_eq!(self.generation, rhs.generation);
        self.values -= rhs.values;
    }
}

// Mul (scalar)

impl std::ops::Mul<Field> for f64 {
    type Output = Field;

    fn mul(self, rhs: Field) -> Self::Output {
        Field::from_values(self * rhs.values, rhs.generation)
    }
}

impl std::ops::Mul<&Field> for f64 {
    type Output = Field;

    fn mul(self, rhs: &Field) -> Self::Output {
        Field::from_values(self * &rhs.values, rhs.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_catches_stale_and_mis_sized_fields() {
        let f = Field::zeros(4, Generation(2));
        assert!(f.check(Generation(2), 4).is_ok());
        assert!(matches!(
            f.check(Generation(3), 4),
            Err(WaveError::StaleGeneration { .. })
        ));
        assert!(matches!(
            f.check(Generation(2), 5),
            Err(WaveError::InvalidStateSize {
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn arithmetic_keeps_generation() {
        let g = Generation(1);
        let a = Field::from_values(na::DVector::from_vec(vec![1., 2.]), g);
        let b = Field::from_values(na::DVector::from_vec(vec![3., -1.]), g);
        let mut c = a.clone() + 2. * &b;
        assert_eq!(c.values, na::DVector::from_vec(vec![7., 0.]));
        c -= a.clone();
        c += &b;
        assert_eq!(c.values, na::DVector::from_vec(vec![9., -3.]));
        assert_eq!(c.generation(), g);
        assert_eq!(a.dot(&b), 1.);
        assert_eq!(g.next(), Generation(2));
    }
}
