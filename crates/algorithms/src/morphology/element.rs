//! Structuring elements for neighbourhood filters
//!
//! A structuring element defines the window shape used by the maximum
//! filter that widens steep-terrain exclusions.

use sarflood_core::{Error, Result};

/// Shape of a structuring element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringElement {
    /// Square element of given radius (side = 2*radius + 1)
    Square(usize),
    /// Cross (plus-shaped) element of given radius
    Cross(usize),
    /// Disk element of given radius
    Disk(usize),
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::Square(1)
    }
}

impl StructuringElement {
    /// Reject zero-radius elements
    pub fn validate(&self) -> Result<()> {
        if self.radius() == 0 {
            return Err(Error::InvalidParameter {
                name: "radius",
                value: "0".to_string(),
                reason: "structuring element radius must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn radius(&self) -> usize {
        match self {
            StructuringElement::Square(r)
            | StructuringElement::Cross(r)
            | StructuringElement::Disk(r) => *r,
        }
    }

    /// (dr, dc) offsets of all active cells, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        let mut offsets = Vec::new();
        for dr in -r..=r {
            for dc in -r..=r {
                let active = match self {
                    StructuringElement::Square(_) => true,
                    StructuringElement::Cross(_) => dr == 0 || dc == 0,
                    StructuringElement::Disk(_) => dr * dr + dc * dc <= r * r,
                };
                if active {
                    offsets.push((dr, dc));
                }
            }
        }
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_offsets() {
        let offsets = StructuringElement::Square(2).offsets();
        assert_eq!(offsets.len(), 25);
        assert!(offsets.contains(&(-2, -2)));
        assert!(offsets.contains(&(2, 2)));
    }

    #[test]
    fn test_cross_offsets() {
        let offsets = StructuringElement::Cross(1).offsets();
        assert_eq!(offsets.len(), 5);
        assert!(offsets.contains(&(0, 0)));
        assert!(!offsets.contains(&(-1, -1)));
    }

    #[test]
    fn test_disk_offsets() {
        // Diagonals at distance sqrt(2) fall outside a radius-1 disk
        assert_eq!(StructuringElement::Disk(1).offsets().len(), 5);
        assert_eq!(StructuringElement::Disk(2).offsets().len(), 13);
    }

    #[test]
    fn test_validate_zero_radius() {
        assert!(StructuringElement::Square(0).validate().is_err());
        assert!(StructuringElement::Disk(3).validate().is_ok());
        assert_eq!(StructuringElement::default(), StructuringElement::Square(1));
    }
}
