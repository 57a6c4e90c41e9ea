use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use anyhow::{anyhow, Context};

/// A dotted or dashed numeric package version such as `1.2-3`.
///
/// Components compare left to right and missing trailing components count
/// as zero, so `1.0` and `1.0.0` are equal. Display keeps the parsed text.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
    components: Vec<u64>,
}

impl PackageVersion {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("version must not be empty"));
        }

        let components = trimmed
            .split(['.', '-'])
            .map(|part| {
                part.parse::<u64>()
                    .with_context(|| format!("invalid version component '{part}' in '{trimmed}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            raw: trimmed.to_string(),
            components,
        })
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    fn significant(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|component| *component != 0)
            .map_or(0, |index| index + 1);
        &self.components[..len]
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant().cmp(other.significant())
    }
}

impl FromStr for PackageVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
}

impl ConstraintOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
        }
    }

    fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "==" | "=" => Ok(Self::Eq),
            ">=" => Ok(Self::Ge),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            "<" => Ok(Self::Lt),
            _ => Err(anyhow!("invalid constraint operator: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    pub op: ConstraintOp,
    pub version: PackageVersion,
}

impl VersionConstraint {
    /// Parses `>= 1.0`, `==2.1-3` and similar forms.
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim();
        let split_at = trimmed
            .find(|ch: char| ch.is_ascii_digit() || ch.is_whitespace())
            .ok_or_else(|| anyhow!("constraint is missing a version: '{trimmed}'"))?;
        let (op, version) = trimmed.split_at(split_at);
        Ok(Self {
            op: ConstraintOp::parse(op.trim())
                .with_context(|| format!("invalid constraint '{trimmed}'"))?,
            version: PackageVersion::parse(version)
                .with_context(|| format!("invalid constraint '{trimmed}'"))?,
        })
    }

    pub fn exact(version: PackageVersion) -> Self {
        Self {
            op: ConstraintOp::Eq,
            version,
        }
    }

    pub fn matches(&self, candidate: &PackageVersion) -> bool {
        let ordering = candidate.cmp(&self.version);
        match self.op {
            ConstraintOp::Eq => ordering == Ordering::Equal,
            ConstraintOp::Ge => ordering != Ordering::Less,
            ConstraintOp::Gt => ordering == Ordering::Greater,
            ConstraintOp::Le => ordering != Ordering::Greater,
            ConstraintOp::Lt => ordering == Ordering::Less,
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}

#[derive(Debug, Clone)]
struct Bound {
    version: PackageVersion,
    inclusive: bool,
}

/// Returns true when at least one version can satisfy every constraint.
///
/// Versions are treated as a dense order, so `> 1.0` together with `< 1.0.1`
/// counts as satisfiable.
pub fn constraints_satisfiable<'a, I>(constraints: I) -> bool
where
    I: IntoIterator<Item = &'a VersionConstraint>,
{
    let mut lower: Option<Bound> = None;
    let mut upper: Option<Bound> = None;
    let mut exact: Option<&PackageVersion> = None;

    for constraint in constraints {
        match constraint.op {
            ConstraintOp::Eq => {
                if exact.is_some_and(|pinned| pinned != &constraint.version) {
                    return false;
                }
                exact = Some(&constraint.version);
            }
            ConstraintOp::Ge | ConstraintOp::Gt => {
                let candidate = Bound {
                    version: constraint.version.clone(),
                    inclusive: constraint.op == ConstraintOp::Ge,
                };
                lower = Some(match lower {
                    Some(current) => tighter_lower(current, candidate),
                    None => candidate,
                });
            }
            ConstraintOp::Le | ConstraintOp::Lt => {
                let candidate = Bound {
                    version: constraint.version.clone(),
                    inclusive: constraint.op == ConstraintOp::Le,
                };
                upper = Some(match upper {
                    Some(current) => tighter_upper(current, candidate),
                    None => candidate,
                });
            }
        }
    }

    if let Some(pinned) = exact {
        let above_lower = lower.as_ref().is_none_or(|bound| match pinned.cmp(&bound.version) {
            Ordering::Greater => true,
            Ordering::Equal => bound.inclusive,
            Ordering::Less => false,
        });
        let below_upper = upper.as_ref().is_none_or(|bound| match pinned.cmp(&bound.version) {
            Ordering::Less => true,
            Ordering::Equal => bound.inclusive,
            Ordering::Greater => false,
        });
        return above_lower && below_upper;
    }

    match (lower, upper) {
        (Some(lower), Some(upper)) => match lower.version.cmp(&upper.version) {
            Ordering::Less => true,
            Ordering::Equal => lower.inclusive && upper.inclusive,
            Ordering::Greater => false,
        },
        _ => true,
    }
}

fn tighter_lower(current: Bound, candidate: Bound) -> Bound {
    match candidate.version.cmp(&current.version) {
        Ordering::Greater => candidate,
        Ordering::Equal if !candidate.inclusive => candidate,
        _ => current,
    }
}

fn tighter_upper(current: Bound, candidate: Bound) -> Bound {
    match candidate.version.cmp(&current.version) {
        Ordering::Less => candidate,
        Ordering::Equal if !candidate.inclusive => candidate,
        _ => current,
    }
}
