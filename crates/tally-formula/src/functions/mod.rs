//! Built-in numeric functions used by the stack machine

pub mod math;
pub mod statistical;

use crate::opcode::Reduction;

/// Outcome of a whole-stack reduction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduced {
    /// Value to push; `None` when the reduction has nothing to return
    pub value: Option<f64>,
    /// Element count, reported only by `avg`
    pub count: Option<usize>,
}

/// Reduce the stack contents (bottom-first) to a single value
pub fn reduce(reduction: Reduction, values: &[f64]) -> Reduced {
    match reduction {
        Reduction::Sum => Reduced {
            value: Some(statistical::sum(values)),
            count: None,
        },
        Reduction::Average => {
            let (mean, count) = statistical::average(values);
            Reduced {
                value: Some(mean),
                count: Some(count),
            }
        }
        Reduction::Min => Reduced {
            value: statistical::min(values),
            count: None,
        },
        Reduction::Max => Reduced {
            value: statistical::max(values),
            count: None,
        },
        Reduction::Count => Reduced {
            value: Some(values.len() as f64),
            count: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_dispatch() {
        let values = [4.0, 8.0];
        assert_eq!(reduce(Reduction::Sum, &values).value, Some(12.0));
        assert_eq!(reduce(Reduction::Count, &values).value, Some(2.0));
        assert_eq!(
            reduce(Reduction::Average, &values),
            Reduced {
                value: Some(6.0),
                count: Some(2),
            }
        );
        assert_eq!(reduce(Reduction::Max, &[]).value, None);
    }
}
