use crate::calc::names::{Id, QualSym, Sym};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which side initiates on a channel of a given type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    /// The provider sends.
    Pos,
    /// The client sends.
    Neg,
    /// Not decided until the alias is resolved.
    Zero,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connective {
    One,
    Link,
    Tensor,
    Lolli,
    Plus,
    With,
    Up,
    Down,
}

impl Connective {
    pub fn name(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Link => "link",
            Self::Tensor => "tensor",
            Self::Lolli => "lolli",
            Self::Plus => "plus",
            Self::With => "with",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A session type as written by callers: an owning tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSpec {
    One,
    Link(QualSym),
    Tensor(Box<Self>, Box<Self>),
    Lolli(Box<Self>, Box<Self>),
    Plus(BTreeMap<Sym, Self>),
    With(BTreeMap<Sym, Self>),
    Up(Box<Self>),
    Down(Box<Self>),
}

#[allow(unused)]
impl TypeSpec {
    pub fn one() -> Self {
        Self::One
    }

    pub fn link(name: QualSym) -> Self {
        Self::Link(name)
    }

    pub fn tensor(value: Self, cont: Self) -> Self {
        Self::Tensor(Box::new(value), Box::new(cont))
    }

    pub fn lolli(value: Self, cont: Self) -> Self {
        Self::Lolli(Box::new(value), Box::new(cont))
    }

    pub fn plus(choices: Vec<(&'static str, Self)>) -> Self {
        Self::Plus(
            choices
                .into_iter()
                .map(|(label, typ)| (Sym::from(label), typ))
                .collect(),
        )
    }

    pub fn with(choices: Vec<(&'static str, Self)>) -> Self {
        Self::With(
            choices
                .into_iter()
                .map(|(label, typ)| (Sym::from(label), typ))
                .collect(),
        )
    }

    pub fn up(cont: Self) -> Self {
        Self::Up(Box::new(cont))
    }

    pub fn down(cont: Self) -> Self {
        Self::Down(Box::new(cont))
    }
}

impl TypeSpec {
    /// Flattens the tree into arena records, one fresh id per node.
    /// Returns the root id and the records, root first.
    pub fn lower(&self) -> (Id, Vec<TypeRec>) {
        fn inner(typ: &TypeSpec, recs: &mut Vec<TypeRec>) -> Id {
            let id = Id::new();
            let slot = recs.len();
            recs.push(TypeRec {
                id,
                node: TypeNode::One,
            });
            let node = match typ {
                TypeSpec::One => TypeNode::One,
                TypeSpec::Link(name) => TypeNode::Link(name.clone()),
                TypeSpec::Tensor(value, cont) => TypeNode::Tensor {
                    value: inner(value, recs),
                    cont: inner(cont, recs),
                },
                TypeSpec::Lolli(value, cont) => TypeNode::Lolli {
                    value: inner(value, recs),
                    cont: inner(cont, recs),
                },
                TypeSpec::Plus(choices) => TypeNode::Plus(
                    choices
                        .iter()
                        .map(|(label, typ)| (label.clone(), inner(typ, recs)))
                        .collect(),
                ),
                TypeSpec::With(choices) => TypeNode::With(
                    choices
                        .iter()
                        .map(|(label, typ)| (label.clone(), inner(typ, recs)))
                        .collect(),
                ),
                TypeSpec::Up(cont) => TypeNode::Up(inner(cont, recs)),
                TypeSpec::Down(cont) => TypeNode::Down(inner(cont, recs)),
            };
            recs[slot].node = node;
            id
        }

        let mut recs = Vec::new();
        let root = inner(self, &mut recs);
        (root, recs)
    }

    /// Every type name this tree refers to.
    pub fn links(&self) -> Vec<QualSym> {
        fn inner(typ: &TypeSpec, names: &mut Vec<QualSym>) {
            match typ {
                TypeSpec::One => {}
                TypeSpec::Link(name) => names.push(name.clone()),
                TypeSpec::Tensor(value, cont) | TypeSpec::Lolli(value, cont) => {
                    inner(value, names);
                    inner(cont, names);
                }
                TypeSpec::Plus(choices) | TypeSpec::With(choices) => {
                    for typ in choices.values() {
                        inner(typ, names);
                    }
                }
                TypeSpec::Up(cont) | TypeSpec::Down(cont) => inner(cont, names),
            }
        }

        let mut names = Vec::new();
        inner(self, &mut names);
        names
    }
}

/// One node of the type arena. Children are addressed by id, aliases by name,
/// so recursive types never form ownership cycles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRec {
    pub id: Id,
    pub node: TypeNode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeNode {
    One,
    Link(QualSym),
    Tensor { value: Id, cont: Id },
    Lolli { value: Id, cont: Id },
    Plus(BTreeMap<Sym, Id>),
    With(BTreeMap<Sym, Id>),
    Up(Id),
    Down(Id),
}

impl TypeNode {
    pub fn polarity(&self) -> Polarity {
        match self {
            Self::One | Self::Tensor { .. } | Self::Plus(_) | Self::Down(_) => Polarity::Pos,
            Self::Lolli { .. } | Self::With(_) | Self::Up(_) => Polarity::Neg,
            Self::Link(_) => Polarity::Zero,
        }
    }

    pub fn connective(&self) -> Connective {
        match self {
            Self::One => Connective::One,
            Self::Link(_) => Connective::Link,
            Self::Tensor { .. } => Connective::Tensor,
            Self::Lolli { .. } => Connective::Lolli,
            Self::Plus(_) => Connective::Plus,
            Self::With(_) => Connective::With,
            Self::Up(_) => Connective::Up,
            Self::Down(_) => Connective::Down,
        }
    }

    pub fn children(&self) -> Vec<Id> {
        match self {
            Self::One | Self::Link(_) => vec![],
            Self::Tensor { value, cont } | Self::Lolli { value, cont } => vec![*value, *cont],
            Self::Plus(choices) | Self::With(choices) => choices.values().copied().collect(),
            Self::Up(cont) | Self::Down(cont) => vec![*cont],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn lowering_gives_every_node_its_own_identity() {
        let typ = TypeSpec::tensor(
            TypeSpec::one(),
            TypeSpec::with(vec![
                ("a", TypeSpec::one()),
                ("b", TypeSpec::link(QualSym::parse("x.y").unwrap())),
            ]),
        );
        let (root, recs) = typ.lower();

        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0].id, root);
        let ids: HashSet<Id> = recs.iter().map(|rec| rec.id).collect();
        assert_eq!(ids.len(), recs.len());

        let TypeNode::Tensor { value, cont } = &recs[0].node else {
            panic!("Expected Tensor at the root");
        };
        assert!(recs.iter().any(|rec| rec.id == *value && rec.node == TypeNode::One));
        let with = recs.iter().find(|rec| rec.id == *cont).unwrap();
        assert_eq!(with.node.connective(), Connective::With);
        assert_eq!(with.node.children().len(), 2);
    }

    #[test]
    fn polarity_follows_the_connective() {
        let (_, recs) = TypeSpec::lolli(TypeSpec::one(), TypeSpec::down(TypeSpec::one())).lower();
        let polarities: Vec<Polarity> = recs.iter().map(|rec| rec.node.polarity()).collect();
        assert_eq!(
            polarities,
            vec![Polarity::Neg, Polarity::Pos, Polarity::Pos, Polarity::Pos]
        );
        assert_eq!(TypeNode::Link(QualSym::parse("t").unwrap()).polarity(), Polarity::Zero);
    }

    #[test]
    fn links_are_collected_in_order() {
        let typ = TypeSpec::plus(vec![
            (
                "cons",
                TypeSpec::tensor(
                    TypeSpec::link(QualSym::parse("item").unwrap()),
                    TypeSpec::link(QualSym::parse("list").unwrap()),
                ),
            ),
            ("nil", TypeSpec::one()),
        ]);
        let names: Vec<String> = typ.links().iter().map(|name| name.to_string()).collect();
        assert_eq!(names, vec!["item", "list"]);
    }
}
