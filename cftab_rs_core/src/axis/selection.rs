use super::Axis;
use crate::{
    error::{bail, ensure, Result},
    names::Identifier,
    toolkit::array::AFloat,
    view::View,
};
use itertools::Itertools;
use rand::{rngs::StdRng, seq::index::sample, SeedableRng};
use std::fmt;

const QUERY_OPERATORS: [&str; 7] = ["<=", ">=", "!=", "==", "=", "<", ">"];

pub type Predicate<'f, T> = Box<dyn Fn(&View<'_, T>) -> bool + 'f>;

/// what a selection picks, before `number` / `randomize` are applied
pub enum Target<'f, T: AFloat> {
    All,
    Ids(Vec<Identifier>),
    /// vectors for which the predicate holds
    Predicate(Predicate<'f, T>),
    /// `"<off-axis name> <op> <value>"`, e.g. `"a >= 3"` over points
    Query(String),
    /// an inclusive range, open ends meaning the first / last position
    Range {
        start: Option<Identifier>,
        end: Option<Identifier>,
    },
}

impl<T: AFloat> fmt::Debug for Target<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
            Self::Query(query) => f.debug_tuple("Query").field(query).finish(),
            Self::Range { start, end } => f
                .debug_struct("Range")
                .field("start", start)
                .field("end", end)
                .finish(),
        }
    }
}

/// the positions an axis operation acts on
#[derive(Debug)]
pub struct Selection<'f, T: AFloat> {
    target: Target<'f, T>,
    number: Option<usize>,
    seed: Option<u64>,
}

impl<'f, T: AFloat> Selection<'f, T> {
    pub fn new(target: Target<'f, T>) -> Self {
        Self {
            target,
            number: None,
            seed: None,
        }
    }
    pub fn all() -> Self {
        Self::new(Target::All)
    }
    pub fn ids<I: Into<Identifier>>(ids: impl IntoIterator<Item = I>) -> Self {
        Self::new(Target::Ids(ids.into_iter().map(Into::into).collect()))
    }
    pub fn one(id: impl Into<Identifier>) -> Self {
        Self::new(Target::Ids(vec![id.into()]))
    }
    pub fn predicate(f: impl Fn(&View<'_, T>) -> bool + 'f) -> Self {
        Self::new(Target::Predicate(Box::new(f)))
    }
    pub fn query(query: impl Into<String>) -> Self {
        Self::new(Target::Query(query.into()))
    }
    pub fn range(start: Option<Identifier>, end: Option<Identifier>) -> Self {
        Self::new(Target::Range { start, end })
    }

    /// keeps only the first `number` matches
    pub fn number(mut self, number: usize) -> Self {
        self.number = Some(number);
        self
    }
    /// picks the `number` matches at random instead, keeping their relative order
    pub fn randomize(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// a parsed `name op value` query
struct Query<'q> {
    name: &'q str,
    operator: &'static str,
    value: f64,
}

impl<'q> Query<'q> {
    fn parse(query: &'q str) -> Result<Self> {
        // the value is numeric, so the operator is the one ending last; on a tie the
        // longer operator wins (`<=` over `=`)
        let Some((at, operator)) = QUERY_OPERATORS
            .iter()
            .filter_map(|&op| query.rfind(op).map(|at| (at, op)))
            .max_by_key(|&(at, op)| (at + op.len(), op.len()))
        else {
            bail!(
                ArgumentValue,
                "no comparison operator found in the query '{query}'"
            );
        };
        let name = query[..at].trim();
        let value = query[at + operator.len()..].trim();
        ensure!(
            !name.is_empty(),
            ArgumentValue,
            "the query '{query}' names no vector"
        );
        let Ok(value) = value.parse::<f64>() else {
            bail!(
                ArgumentType,
                "'{value}' in the query '{query}' is not a number"
            );
        };
        Ok(Self {
            name,
            operator,
            value,
        })
    }

    fn matches<T: AFloat>(&self, v: T) -> bool {
        let Some(value) = T::from_f64(self.value) else {
            return false;
        };
        match self.operator {
            "<=" => v <= value,
            ">=" => v >= value,
            "!=" => v != value,
            "==" | "=" => v == value,
            "<" => v < value,
            _ => v > value,
        }
    }
}

impl<T: AFloat> Axis<'_, T> {
    /// the positions picked by `selection`, in selection order
    pub(crate) fn resolve(&self, selection: &Selection<'_, T>) -> Result<Vec<usize>> {
        let registry = self.registry();
        let mut positions: Vec<usize> = match &selection.target {
            Target::All => (0..self.len()).collect(),
            Target::Ids(ids) => {
                let positions = ids
                    .iter()
                    .map(|id| registry.index_of(id))
                    .collect::<Result<Vec<_>>>()?;
                if let Some(duplicate) = positions.iter().duplicates().next() {
                    bail!(
                        ArgumentValue,
                        "{} {duplicate} is selected more than once",
                        self.kind
                    );
                }
                positions
            }
            Target::Predicate(predicate) => self
                .iter()
                .enumerate()
                .filter(|(_, view)| predicate(view))
                .map(|(position, _)| position)
                .collect(),
            Target::Query(query) => {
                let query = Query::parse(query)?;
                let across = self.base.registry(self.kind.other());
                let position = across.index_of(&Identifier::from(query.name))?;
                self.base
                    .backend
                    .vector(self.kind.other(), position)
                    .into_iter()
                    .enumerate()
                    .filter(|&(_, v)| query.matches(v))
                    .map(|(position, _)| position)
                    .collect()
            }
            Target::Range { start, end } => {
                if self.is_empty() && start.is_none() && end.is_none() {
                    return Ok(vec![]);
                }
                let start = match start {
                    Some(start) => registry.index_of(start)?,
                    None => 0,
                };
                let end = match end {
                    Some(end) => registry.index_of(end)?,
                    None => self.len() - 1,
                };
                ensure!(
                    start <= end,
                    ArgumentValue,
                    "the {} range starts at {start} but ends at {end}",
                    self.kind
                );
                (start..=end).collect()
            }
        };
        match (selection.number, selection.seed) {
            (None, Some(_)) => bail!(
                ArgumentValue,
                "a randomized selection requires a number of {}s",
                self.kind
            ),
            (None, None) => {}
            (Some(number), seed) => {
                ensure!(
                    number <= positions.len(),
                    ArgumentValue,
                    "{number} {}s were requested but only {} match",
                    self.kind,
                    positions.len()
                );
                match seed {
                    None => positions.truncate(number),
                    Some(seed) => {
                        let mut rng = StdRng::seed_from_u64(seed);
                        let mut picked = sample(&mut rng, positions.len(), number).into_vec();
                        picked.sort_unstable();
                        positions = picked.into_iter().map(|i| positions[i]).collect();
                    }
                }
            }
        }
        Ok(positions)
    }

    /// how many positions `selection` picks
    pub fn count(&self, selection: &Selection<'_, T>) -> Result<usize> {
        Ok(self.resolve(selection)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::BackendKind,
        base::{
            tests::{get_test_base, KINDS},
            Base,
        },
        error::Error,
    };

    #[test]
    fn test_ids() {
        let base = get_test_base(BackendKind::Dense);
        let points = base.points();
        assert_eq!(points.resolve(&Selection::all()).unwrap(), [0, 1, 2, 3]);
        assert_eq!(
            points.resolve(&Selection::ids(["p3", "p1"])).unwrap(),
            [3, 1]
        );
        assert_eq!(points.resolve(&Selection::one(-2)).unwrap(), [2]);
        assert!(matches!(
            points.resolve(&Selection::ids([Identifier::from("p1"), Identifier::from(1)])),
            Err(Error::ArgumentValue(_))
        ));
        assert!(matches!(
            points.resolve(&Selection::one("x")),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_predicate_and_query() {
        for kind in KINDS {
            let base = get_test_base(kind);
            let points = base.points();
            let selection = Selection::<f64>::predicate(|view| view.contains_zero());
            assert_eq!(points.resolve(&selection).unwrap(), [0, 1, 2, 3]);
            let selection = Selection::<f64>::predicate(|view| view.named("c").unwrap() > 5.);
            assert_eq!(points.resolve(&selection).unwrap(), [1, 3]);
            assert_eq!(points.resolve(&Selection::query("c >= 6")).unwrap(), [1, 3]);
            assert_eq!(points.resolve(&Selection::query("a=0")).unwrap(), [1, 3]);
            assert_eq!(points.resolve(&Selection::query("a != 0")).unwrap(), [0, 2]);
            assert_eq!(
                base.features().resolve(&Selection::query("p3 < 12")).unwrap(),
                [0, 1]
            );
            assert_eq!(points.resolve(&Selection::query("c<=3")).unwrap(), [0, 2]);
            assert_eq!(points.resolve(&Selection::query("c == 6")).unwrap(), [1]);
            assert!(matches!(
                points.resolve(&Selection::query("c >= x")),
                Err(Error::ArgumentType(_))
            ));
            assert!(matches!(
                points.resolve(&Selection::query("c ~ 1")),
                Err(Error::ArgumentValue(_))
            ));
            assert!(matches!(
                points.resolve(&Selection::query("z > 1")),
                Err(Error::InvalidIdentifier(_))
            ));
        }
    }

    #[test]
    fn test_query_with_operator_in_name() {
        let base = Base::from_rows(vec![vec![1., 5.], vec![4., 2.]], BackendKind::Sparse)
            .unwrap()
            .with_feature_names(["a=b", "x<y"])
            .unwrap();
        let points = base.points();
        assert_eq!(points.resolve(&Selection::query("a=b < 3")).unwrap(), [0]);
        assert_eq!(points.resolve(&Selection::query("x<y>=5")).unwrap(), [0]);
        assert_eq!(points.resolve(&Selection::query("a=b != 1")).unwrap(), [1]);
    }

    #[test]
    fn test_range() {
        let base = get_test_base(BackendKind::Sparse);
        let points = base.points();
        let range = Selection::range(Some("p1".into()), None);
        assert_eq!(points.resolve(&range).unwrap(), [1, 2, 3]);
        let range = Selection::range(None, Some(1.into()));
        assert_eq!(points.resolve(&range).unwrap(), [0, 1]);
        let range = Selection::range(Some(2.into()), Some(1.into()));
        assert!(matches!(points.resolve(&range), Err(Error::ArgumentValue(_))));
    }

    #[test]
    fn test_number() {
        let base = get_test_base(BackendKind::Dense);
        let points = base.points();
        assert_eq!(points.resolve(&Selection::all().number(2)).unwrap(), [0, 1]);
        assert!(matches!(
            points.resolve(&Selection::all().number(5)),
            Err(Error::ArgumentValue(_))
        ));
        assert!(matches!(
            points.resolve(&Selection::all().randomize(1)),
            Err(Error::ArgumentValue(_))
        ));
        let random = Selection::all().number(3).randomize(42);
        let picked = points.resolve(&random).unwrap();
        assert_eq!(picked.len(), 3);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(picked, points.resolve(&random).unwrap());
        assert_eq!(points.count(&Selection::query("b > 0")).unwrap(), 1);
    }
}
