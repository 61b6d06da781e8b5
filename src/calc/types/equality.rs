use super::core::TypeNode;
use crate::calc::context::Env;
use crate::calc::error::Error;
use crate::calc::names::Id;
use std::collections::HashSet;

impl Env {
    /// Structural equality of two loaded types. Aliases are unfolded; a pair of
    /// nodes already under comparison is taken as equal, which is what makes
    /// recursive types equal to themselves.
    pub fn eqtp(&self, a: Id, b: Id) -> Result<bool, Error> {
        self.eqtp_inner(a, b, &mut HashSet::new())
    }

    fn eqtp_inner(&self, a: Id, b: Id, seen: &mut HashSet<(Id, Id)>) -> Result<bool, Error> {
        if a == b || !seen.insert((a, b)) {
            return Ok(true);
        }
        let (a, node_a) = self.resolve(a)?;
        let (b, node_b) = self.resolve(b)?;
        if a == b {
            return Ok(true);
        }

        Ok(match (node_a, node_b) {
            (TypeNode::One, TypeNode::One) => true,

            (
                TypeNode::Tensor {
                    value: value1,
                    cont: cont1,
                },
                TypeNode::Tensor {
                    value: value2,
                    cont: cont2,
                },
            )
            | (
                TypeNode::Lolli {
                    value: value1,
                    cont: cont1,
                },
                TypeNode::Lolli {
                    value: value2,
                    cont: cont2,
                },
            ) => {
                self.eqtp_inner(*value1, *value2, seen)?
                    && self.eqtp_inner(*cont1, *cont2, seen)?
            }

            (TypeNode::Plus(choices1), TypeNode::Plus(choices2))
            | (TypeNode::With(choices1), TypeNode::With(choices2)) => {
                if choices1.len() != choices2.len() {
                    return Ok(false);
                }
                for (label, typ1) in choices1 {
                    let Some(typ2) = choices2.get(label) else {
                        return Ok(false);
                    };
                    if !self.eqtp_inner(*typ1, *typ2, seen)? {
                        return Ok(false);
                    }
                }
                true
            }

            (TypeNode::Up(cont1), TypeNode::Up(cont2))
            | (TypeNode::Down(cont1), TypeNode::Down(cont2)) => {
                self.eqtp_inner(*cont1, *cont2, seen)?
            }

            _ => false,
        })
    }
}
