//! Connected-component labelling of binary masks

use ndarray::{Array2, ArrayView2};
use sarflood_core::Connectivity;

/// One connected component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    /// Label in the label grid (1-based)
    pub label: u32,
    /// Number of cells
    pub area: usize,
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl Component {
    /// Bounding-box height in cells
    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    /// Bounding-box width in cells
    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    /// Largest bounding-box side; the component's diameter for openings
    pub fn extent(&self) -> usize {
        self.height().max(self.width())
    }
}

/// Label grid plus per-component summaries
#[derive(Debug, Clone)]
pub struct Labeling {
    /// 0 = not part of any component
    pub labels: Array2<u32>,
    /// Indexed by `label - 1`
    pub components: Vec<Component>,
}

impl Labeling {
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component(&self, label: u32) -> Option<&Component> {
        label
            .checked_sub(1)
            .and_then(|i| self.components.get(i as usize))
    }
}

/// Label connected regions of a mask.
///
/// With `foreground = true` set cells (non-zero) are labelled, otherwise the
/// unset cells are, which is how holes are found.
pub fn label_components(
    mask: ArrayView2<'_, u8>,
    foreground: bool,
    connectivity: Connectivity,
) -> Labeling {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut components = Vec::new();
    let selected = |v: u8| (v != 0) == foreground;

    let mut stack = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if labels[(row, col)] != 0 || !selected(mask[(row, col)]) {
                continue;
            }

            let label = components.len() as u32 + 1;
            let mut component = Component {
                label,
                area: 0,
                min_row: row,
                max_row: row,
                min_col: col,
                max_col: col,
            };

            labels[(row, col)] = label;
            stack.push((row, col));
            while let Some((r, c)) = stack.pop() {
                component.area += 1;
                component.min_row = component.min_row.min(r);
                component.max_row = component.max_row.max(r);
                component.min_col = component.min_col.min(c);
                component.max_col = component.max_col.max(c);

                connectivity.for_each_neighbor(r, c, rows, cols, |nr, nc| {
                    if labels[(nr, nc)] == 0 && selected(mask[(nr, nc)]) {
                        labels[(nr, nc)] = label;
                        stack.push((nr, nc));
                    }
                });
            }

            components.push(component);
        }
    }

    Labeling { labels, components }
}
