use std::{
    cell::OnceCell,
    fmt::{Debug, Display},
    hash::Hash,
    rc::Rc,
};

use cube_geometry::{MoveMerge, MoveParseError, Puzzle, PuzzleState, apply_moves};
use fxhash::FxHashMap;

use crate::{
    config::{ChainConfig, VerificationLevel},
    permutation_map::PermutationMap,
    short_words::ShortWordTable,
};

/// Longer actions are displayed as their move count only.
const DISPLAY_LIMIT: usize = 64;

/// The algebra context shared by every `Action` of one puzzle: the puzzle
/// itself, the identity element, and the policies deciding when to switch to
/// formula mode and when to verify.
pub struct PuzzleGroup<P: Puzzle> {
    puzzle: P,
    solved: PuzzleState,
    identity: Rc<Node<P::Move>>,
    eager_threshold: usize,
    replay_check_limit: usize,
    verification: VerificationLevel,
}

/// An element of a puzzle's group. It is either an explicit list of moves or
/// a formula over other actions, and lazily backed by a `PermutationMap`.
///
/// `a.multiply(&b)` is the action that performs `b` and then `a`.
pub struct Action<P: Puzzle> {
    group: Rc<PuzzleGroup<P>>,
    node: Rc<Node<P::Move>>,
}

struct Node<M> {
    formula: Formula<M>,
    /// The number of moves of the flattened formula, saturating
    len: usize,
    /// The number of moves of the flattened inverse, saturating
    inverse_len: usize,
    map: OnceCell<PermutationMap>,
}

enum Formula<M> {
    Moves(Box<[M]>),
    /// The right operand is performed first
    Product(Rc<Node<M>>, Rc<Node<M>>),
    Inverse(Rc<Node<M>>),
}

/// How far `Action::simplify` goes. Every level includes the previous ones.
pub enum SimplifyLevel<'a, P: Puzzle> {
    /// Merge and cancel adjacent moves on the same axis.
    CancelMoves,
    /// Push inversions down to the move lists.
    SinkInversions,
    /// Turn the whole formula into one move list.
    Flatten,
    /// Replace move runs by shorter words reaching the same state.
    ShortWords(&'a ShortWordTable<P>),
}

impl<P: Puzzle> Clone for SimplifyLevel<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Puzzle> Copy for SimplifyLevel<'_, P> {}

impl<P: Puzzle> PuzzleGroup<P> {
    #[must_use]
    pub fn new(puzzle: P, config: &ChainConfig) -> Rc<Self> {
        let identity = Rc::new(Node {
            formula: Formula::Moves(Box::new([])),
            len: 0,
            inverse_len: 0,
            map: OnceCell::from(PermutationMap::identity(&puzzle)),
        });
        Rc::new(PuzzleGroup {
            solved: puzzle.solved(),
            puzzle,
            identity,
            eager_threshold: config.eager_threshold,
            replay_check_limit: config.replay_check_limit,
            verification: config.verification,
        })
    }

    pub fn puzzle(&self) -> &P {
        &self.puzzle
    }

    pub fn solved(&self) -> &PuzzleState {
        &self.solved
    }

    pub fn verification(&self) -> VerificationLevel {
        self.verification
    }

    /// Decide whether the next internal consistency check runs.
    pub(crate) fn verify(&self) -> bool {
        self.verification.should_verify()
    }

    #[must_use]
    pub fn identity(self: &Rc<Self>) -> Action<P> {
        Action {
            group: Rc::clone(self),
            node: Rc::clone(&self.identity),
        }
    }

    /// The action performing `moves` in order.
    #[must_use]
    pub fn from_moves(self: &Rc<Self>, moves: Vec<P::Move>) -> Action<P> {
        Action {
            group: Rc::clone(self),
            node: self.leaf(moves),
        }
    }

    /// Parse an action written in the puzzle's notation.
    ///
    /// # Errors
    ///
    /// If any token does not name a move of the puzzle.
    pub fn parse(self: &Rc<Self>, moves: &str) -> Result<Action<P>, MoveParseError> {
        Ok(self.from_moves(self.puzzle.parse_moves(moves)?))
    }

    /// One single-move action per generator of the puzzle.
    #[must_use]
    pub fn generators(self: &Rc<Self>) -> Vec<Action<P>> {
        self.puzzle
            .generators()
            .iter()
            .map(|&move_| self.from_moves(vec![move_]))
            .collect()
    }

    /// A random word of `length` generators, so always an element of the
    /// group. The identity if the puzzle has no generators.
    #[must_use]
    pub fn random(self: &Rc<Self>, length: usize) -> Action<P> {
        let generators = self.puzzle.generators();
        if generators.is_empty() {
            return self.identity();
        }
        self.from_moves(
            (0..length)
                .map(|_| generators[fastrand::usize(..generators.len())])
                .collect(),
        )
    }

    fn leaf(&self, moves: Vec<P::Move>) -> Rc<Node<P::Move>> {
        if moves.is_empty() {
            return Rc::clone(&self.identity);
        }
        Rc::new(self.leaf_node(moves.into_boxed_slice(), OnceCell::new()))
    }

    fn leaf_node(&self, moves: Box<[P::Move]>, map: OnceCell<PermutationMap>) -> Node<P::Move> {
        let inverse_len = moves
            .iter()
            .map(|&move_| self.puzzle.reverse_decomposition(move_).len())
            .fold(0_usize, usize::saturating_add);
        Node {
            len: moves.len(),
            inverse_len,
            formula: Formula::Moves(moves),
            map,
        }
    }

    /// `left` after `right`. Operands small enough are spliced into a move
    /// list, optionally cancelling moves at the seam.
    fn product(
        &self,
        left: &Rc<Node<P::Move>>,
        right: &Rc<Node<P::Move>>,
        cancel: bool,
    ) -> Rc<Node<P::Move>> {
        if left.len == 0 {
            return Rc::clone(right);
        }
        if right.len == 0 {
            return Rc::clone(left);
        }

        let len = left.len.saturating_add(right.len);
        let map = match (left.map.get(), right.map.get()) {
            (Some(left), Some(right)) => OnceCell::from(left.compose(right)),
            _ => OnceCell::new(),
        };

        if len <= self.eager_threshold {
            let mut moves = self.flatten(right, false);
            moves.extend(self.flatten(left, false));
            if cancel {
                moves = self.cancel(&moves);
                if moves.is_empty() {
                    return Rc::clone(&self.identity);
                }
            }
            return Rc::new(self.leaf_node(moves.into_boxed_slice(), map));
        }

        Rc::new(Node {
            formula: Formula::Product(Rc::clone(left), Rc::clone(right)),
            len,
            inverse_len: left.inverse_len.saturating_add(right.inverse_len),
            map,
        })
    }

    fn inverse(&self, node: &Rc<Node<P::Move>>, cancel: bool) -> Rc<Node<P::Move>> {
        if node.len == 0 {
            return Rc::clone(node);
        }
        if let Formula::Inverse(child) = &node.formula {
            return Rc::clone(child);
        }

        let map = node
            .map
            .get()
            .map_or_else(OnceCell::new, |map| OnceCell::from(map.invert()));

        if node.inverse_len <= self.eager_threshold {
            let mut moves = self.flatten(node, true);
            if cancel {
                moves = self.cancel(&moves);
                if moves.is_empty() {
                    return Rc::clone(&self.identity);
                }
            }
            return Rc::new(self.leaf_node(moves.into_boxed_slice(), map));
        }

        Rc::new(Node {
            formula: Formula::Inverse(Rc::clone(node)),
            len: node.inverse_len,
            inverse_len: node.len,
            map,
        })
    }

    /// The moves of a formula (or its inverse) in application order.
    fn flatten(&self, root: &Node<P::Move>, inverted: bool) -> Vec<P::Move> {
        let len = if inverted { root.inverse_len } else { root.len };
        let mut moves = Vec::with_capacity(len.min(1 << 16));
        let mut stack = vec![(root, inverted)];

        while let Some((node, inverted)) = stack.pop() {
            match (&node.formula, inverted) {
                (Formula::Moves(list), false) => moves.extend_from_slice(list),
                (Formula::Moves(list), true) => {
                    for &move_ in list.iter().rev() {
                        moves.extend(self.puzzle.reverse_decomposition(move_));
                    }
                }
                (Formula::Product(left, right), false) => {
                    stack.push((left.as_ref(), false));
                    stack.push((right.as_ref(), false));
                }
                (Formula::Product(left, right), true) => {
                    stack.push((right.as_ref(), true));
                    stack.push((left.as_ref(), true));
                }
                (Formula::Inverse(child), inverted) => stack.push((child.as_ref(), !inverted)),
            }
        }

        moves
    }

    fn replay_map(&self, moves: &[P::Move]) -> PermutationMap {
        let state = apply_moves(&self.puzzle, &self.solved, moves);
        PermutationMap::from_transform(&self.puzzle, &self.solved, &state)
            .expect("elementary moves rearrange whole pieces")
    }

    /// Build the permutation map of `root` and of every formula below it that
    /// is still missing one.
    fn materialize<'a>(&self, root: &'a Node<P::Move>) -> &'a PermutationMap {
        if let Some(map) = root.map.get() {
            return map;
        }

        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if node.map.get().is_some() {
                continue;
            }
            match &node.formula {
                Formula::Moves(moves) => {
                    node.map.get_or_init(|| self.replay_map(moves));
                }
                Formula::Product(left, right) => {
                    if expanded {
                        node.map.get_or_init(|| built(left).compose(built(right)));
                    } else {
                        stack.push((node, true));
                        stack.push((left.as_ref(), false));
                        stack.push((right.as_ref(), false));
                    }
                }
                Formula::Inverse(child) => {
                    if expanded {
                        node.map.get_or_init(|| built(child).invert());
                    } else {
                        stack.push((node, true));
                        stack.push((child.as_ref(), false));
                    }
                }
            }
        }

        let map = built(root);
        if root.len <= self.replay_check_limit && self.verify() {
            let replayed = apply_moves(&self.puzzle, &self.solved, &self.flatten(root, false));
            assert_eq!(
                map.apply(&self.puzzle, &self.solved),
                replayed,
                "a materialized map diverged from the replay of its moves"
            );
        }
        map
    }

    /// Merge adjacent moves on the same axis. Runs of commuting moves are
    /// kept sorted by layer with at most one move per layer.
    fn cancel(&self, moves: &[P::Move]) -> Vec<P::Move> {
        let puzzle = &self.puzzle;
        let mut out: Vec<P::Move> = Vec::with_capacity(moves.len());

        'moves: for &move_ in moves {
            let axis = puzzle.move_axis(move_);
            let layer = puzzle.move_layer(move_);

            let mut run_start = out.len();
            while run_start > 0 && puzzle.move_axis(out[run_start - 1]) == axis {
                run_start -= 1;
                if puzzle.move_layer(out[run_start]) == layer {
                    match puzzle.merge_moves(out[run_start], move_) {
                        MoveMerge::Cancel => {
                            out.remove(run_start);
                        }
                        MoveMerge::Combined(merged) => out[run_start] = merged,
                    }
                    continue 'moves;
                }
            }

            let position = run_start
                + out[run_start..].partition_point(|&other| puzzle.move_layer(other) < layer);
            out.insert(position, move_);
        }

        out
    }

    /// Rebuild a formula with every move list cancelled, optionally pushing
    /// inversions down to the move lists. Shared sub-formulas are rebuilt once.
    fn rewrite(&self, root: &Rc<Node<P::Move>>, sink: bool) -> Rc<Node<P::Move>> {
        let mut memo: FxHashMap<(*const Node<P::Move>, bool), Rc<Node<P::Move>>> =
            FxHashMap::default();
        let mut stack = vec![(root, false, false)];

        while let Some((node, inverted, expanded)) = stack.pop() {
            let key = (Rc::as_ptr(node), inverted);
            if memo.contains_key(&key) {
                continue;
            }

            let rewritten = match &node.formula {
                Formula::Moves(moves) => {
                    if inverted {
                        self.leaf(self.cancel(&self.flatten(node, true)))
                    } else {
                        let cancelled = self.cancel(moves);
                        if cancelled[..] == moves[..] {
                            Rc::clone(node)
                        } else {
                            self.leaf(cancelled)
                        }
                    }
                }
                Formula::Product(left, right) => {
                    let (first, second) = if inverted { (right, left) } else { (left, right) };
                    if !expanded {
                        stack.push((node, inverted, true));
                        stack.push((first, inverted, false));
                        stack.push((second, inverted, false));
                        continue;
                    }
                    let first_new = Rc::clone(&memo[&(Rc::as_ptr(first), inverted)]);
                    let second_new = Rc::clone(&memo[&(Rc::as_ptr(second), inverted)]);
                    if !inverted && Rc::ptr_eq(&first_new, left) && Rc::ptr_eq(&second_new, right)
                    {
                        Rc::clone(node)
                    } else {
                        self.product(&first_new, &second_new, true)
                    }
                }
                Formula::Inverse(child) => {
                    let child_inverted = if sink { !inverted } else { inverted };
                    if !expanded {
                        stack.push((node, inverted, true));
                        stack.push((child, child_inverted, false));
                        continue;
                    }
                    let child_new = Rc::clone(&memo[&(Rc::as_ptr(child), child_inverted)]);
                    if sink {
                        child_new
                    } else if Rc::ptr_eq(&child_new, child) {
                        Rc::clone(node)
                    } else {
                        self.inverse(&child_new, true)
                    }
                }
            };
            memo.insert(key, rewritten);
        }

        memo.remove(&(Rc::as_ptr(root), false))
            .expect("the root is rewritten last")
    }
}

fn built<M>(node: &Node<M>) -> &PermutationMap {
    node.map
        .get()
        .expect("sub-formulas are materialized before their parents")
}

impl<P: Puzzle> Action<P> {
    pub fn group(&self) -> &Rc<PuzzleGroup<P>> {
        &self.group
    }

    /// The action performing `other` and then `self`.
    #[must_use]
    pub fn multiply(&self, other: &Action<P>) -> Action<P> {
        debug_assert!(Rc::ptr_eq(&self.group, &other.group));
        Action {
            node: self.group.product(&self.node, &other.node, false),
            group: Rc::clone(&self.group),
        }
    }

    #[must_use]
    pub fn invert(&self) -> Action<P> {
        Action {
            node: self.group.inverse(&self.node, false),
            group: Rc::clone(&self.group),
        }
    }

    /// The number of elementary moves this action stands for.
    #[must_use]
    pub fn count(&self) -> usize {
        self.node.len
    }

    /// Whether this action is a formula rather than a move list.
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        !matches!(self.node.formula, Formula::Moves(_))
    }

    /// The same element in formula mode.
    #[must_use]
    pub fn lazy(&self) -> Action<P> {
        let Formula::Moves(moves) = &self.node.formula else {
            return self.clone();
        };
        let (first, second) = moves.split_at(moves.len() / 2);
        let first = Rc::new(self.group.leaf_node(first.into(), OnceCell::new()));
        let second = Rc::new(self.group.leaf_node(second.into(), OnceCell::new()));
        Action {
            node: Rc::new(Node {
                len: self.node.len,
                inverse_len: self.node.inverse_len,
                formula: Formula::Product(second, first),
                map: OnceCell::new(),
            }),
            group: Rc::clone(&self.group),
        }
    }

    /// The permutation map of this action, built on first use.
    pub fn map(&self) -> &PermutationMap {
        self.group.materialize(&self.node)
    }

    #[must_use]
    pub fn apply(&self, state: &PuzzleState) -> PuzzleState {
        let puzzle = &self.group.puzzle;
        if let Some(map) = self.node.map.get() {
            return map.apply(puzzle, state);
        }
        if let Formula::Moves(moves) = &self.node.formula
            && moves.len() <= self.group.eager_threshold
        {
            return apply_moves(puzzle, state, moves);
        }
        self.map().apply(puzzle, state)
    }

    /// The moves of this action in application order.
    #[must_use]
    pub fn moves(&self) -> Vec<P::Move> {
        self.group.flatten(&self.node, false)
    }

    /// The moves of this action, last applied first.
    #[must_use]
    pub fn moves_rev(&self) -> Vec<P::Move> {
        let mut moves = self.moves();
        moves.reverse();
        moves
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.node.len == 0 || self.map().is_identity()
    }

    /// A representation of the same element, simplified up to `level`.
    ///
    /// # Panics
    ///
    /// If verification is enabled and the simplified action differs from this
    /// one.
    #[must_use]
    pub fn simplify(&self, level: SimplifyLevel<'_, P>) -> Action<P> {
        let group = &self.group;
        let node = match level {
            SimplifyLevel::CancelMoves => group.rewrite(&self.node, false),
            SimplifyLevel::SinkInversions => group.rewrite(&self.node, true),
            SimplifyLevel::Flatten => group.leaf(group.cancel(&group.flatten(&self.node, false))),
            SimplifyLevel::ShortWords(table) => {
                let mut moves = group.cancel(&group.flatten(&self.node, false));
                loop {
                    let shorter = group.cancel(&table.shorten(&group.puzzle, &moves));
                    if shorter.len() >= moves.len() {
                        break;
                    }
                    moves = shorter;
                }
                group.leaf(moves)
            }
        };

        let simplified = Action {
            group: Rc::clone(group),
            node,
        };
        if group.verify() {
            assert_eq!(
                simplified.map(),
                self.map(),
                "simplification changed the represented element"
            );
        }
        simplified
    }
}

impl<P: Puzzle> Clone for Action<P> {
    fn clone(&self) -> Self {
        Action {
            group: Rc::clone(&self.group),
            node: Rc::clone(&self.node),
        }
    }
}

impl<P: Puzzle> PartialEq for Action<P> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node) || self.map() == other.map()
    }
}

impl<P: Puzzle> Eq for Action<P> {}

impl<P: Puzzle> Hash for Action<P> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.map().hash(state);
    }
}

impl<P: Puzzle> Display for Action<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.count() {
            0 => write!(f, "<identity>"),
            count if count > DISPLAY_LIMIT => write!(f, "<{count} moves>"),
            _ => write!(f, "{}", self.group.puzzle.format_moves(&self.moves())),
        }
    }
}

impl<P: Puzzle> Debug for Action<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action({self})")
    }
}

#[cfg(test)]
mod tests {
    use cube_geometry::{Cube, MoveSet};

    use super::*;

    fn group(size: u8, eager_threshold: usize) -> Rc<PuzzleGroup<Cube>> {
        PuzzleGroup::new(
            Cube::new(size, MoveSet::Faces).unwrap(),
            &ChainConfig {
                eager_threshold,
                verification: VerificationLevel::Always,
                ..ChainConfig::default()
            },
        )
    }

    fn random_state(group: &Rc<PuzzleGroup<Cube>>) -> PuzzleState {
        group.random(20).apply(group.solved())
    }

    fn has_inverse_nodes<M>(root: &Node<M>) -> bool {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match &node.formula {
                Formula::Moves(_) => {}
                Formula::Product(left, right) => {
                    stack.push(left.as_ref());
                    stack.push(right.as_ref());
                }
                Formula::Inverse(_) => return true,
            }
        }
        false
    }

    /// A deep formula whose operands are all longer than the eager threshold.
    fn lazy_tree(group: &Rc<PuzzleGroup<Cube>>) -> Action<Cube> {
        let a = group.random(9);
        let b = group.random(7);
        let c = group.random(12);
        a.multiply(&b.invert())
            .multiply(&c)
            .invert()
            .multiply(&a.multiply(&c).invert())
            .multiply(&b.multiply(&b))
    }

    #[test]
    fn group_axioms() {
        fastrand::seed(1);
        for threshold in [0, 4, 1000] {
            let group = group(3, threshold);
            let identity = group.identity();
            for _ in 0..10 {
                let a = group.random(fastrand::usize(0..15));
                let b = group.random(fastrand::usize(0..15));
                let c = group.random(fastrand::usize(0..15));

                assert_eq!(a.multiply(&b).multiply(&c), a.multiply(&b.multiply(&c)));
                assert_eq!(a.multiply(&identity), a);
                assert_eq!(identity.multiply(&a), a);
                assert!(a.multiply(&a.invert()).is_identity());
                assert!(a.invert().multiply(&a).is_identity());

                let state = random_state(&group);
                assert_eq!(a.multiply(&b).apply(&state), a.apply(&b.apply(&state)));
            }
        }
    }

    #[test]
    fn moves_in_application_order() {
        let group = group(3, 32);
        let r = group.parse("R").unwrap();
        let u = group.parse("U").unwrap();
        let cube = group.puzzle();

        let product = u.multiply(&r);
        assert_eq!(product.moves(), cube.parse_moves("R U").unwrap());
        assert_eq!(product.moves_rev(), cube.parse_moves("U R").unwrap());
        assert_eq!(product, group.parse("R U").unwrap());
        assert_eq!(
            product.invert().moves(),
            cube.parse_moves("U' R'").unwrap()
        );
        assert_eq!(product.to_string(), "R U");
        assert_eq!(group.identity().to_string(), "<identity>");
        assert_eq!(group.random(100).to_string(), "<100 moves>");
    }

    #[test]
    fn formula_mode_past_threshold() {
        let group = group(3, 4);
        let a = group.parse("R U R' U'").unwrap();
        let b = group.parse("F").unwrap();

        assert!(!a.is_lazy());
        let product = a.multiply(&b);
        assert!(product.is_lazy());
        assert_eq!(product.count(), 5);
        assert_eq!(product.moves(), group.parse("F R U R' U'").unwrap().moves());

        let inverse = product.invert();
        assert!(inverse.is_lazy());
        assert_eq!(inverse.count(), 5);
        assert!(Rc::ptr_eq(&inverse.invert().node, &product.node));

        // Spliced products stay eager
        assert!(!b.multiply(&b).is_lazy());
        assert_eq!(b.multiply(&b).moves(), group.parse("F F").unwrap().moves());
    }

    #[test]
    fn eager_and_lazy_agree() {
        fastrand::seed(2);
        let group = group(4, 8);
        for _ in 0..20 {
            let eager = group.random(fastrand::usize(0..40));
            let lazy = eager.lazy();
            assert!(lazy.is_lazy());
            assert_eq!(lazy.count(), eager.count());
            assert_eq!(lazy.moves(), eager.moves());
            for _ in 0..3 {
                let state = random_state(&group);
                assert_eq!(lazy.apply(&state), eager.apply(&state));
            }
            assert_eq!(lazy, eager);
        }
    }

    #[test]
    fn move_orders() {
        let group = group(3, 32);
        let cube = group.puzzle();
        for &move_ in cube.moves() {
            let single = group.from_moves(vec![move_]);
            let repeated = group.from_moves(vec![move_; cube.move_order(move_) as usize]);
            assert!(!single.is_identity());
            assert!(repeated.is_identity());
        }
    }

    #[test]
    fn cancel_moves() {
        let group = group(3, 32);
        let cube = group.puzzle();
        let simplify = |moves: &str| {
            group
                .parse(moves)
                .unwrap()
                .simplify(SimplifyLevel::CancelMoves)
                .moves()
        };

        assert_eq!(simplify("R R R' U U2 U"), cube.parse_moves("R").unwrap());
        assert_eq!(simplify("R L R"), cube.parse_moves("L R2").unwrap());
        assert_eq!(simplify("R U U' R'"), vec![]);
        assert_eq!(simplify("R U R' F"), cube.parse_moves("R U R' F").unwrap());
        assert_eq!(simplify("R L' R' L"), vec![]);
    }

    #[test]
    fn simplify_levels_keep_the_element() {
        fastrand::seed(3);
        let group = group(3, 6);
        let table = ShortWordTable::new(group.puzzle(), 1);
        for _ in 0..5 {
            let action = lazy_tree(&group);
            for level in [
                SimplifyLevel::CancelMoves,
                SimplifyLevel::SinkInversions,
                SimplifyLevel::Flatten,
                SimplifyLevel::ShortWords(&table),
            ] {
                let once = action.simplify(level);
                let twice = once.simplify(level);
                assert_eq!(once, action);
                assert!(once.count() <= action.count());
                assert_eq!(twice.moves(), once.moves());
                for _ in 0..3 {
                    let state = random_state(&group);
                    assert_eq!(once.apply(&state), action.apply(&state));
                }
            }
        }
    }

    #[test]
    fn sink_inversions() {
        fastrand::seed(4);
        let group = group(3, 6);
        let action = lazy_tree(&group);
        assert!(has_inverse_nodes(action.node.as_ref()));

        let sunk = action.simplify(SimplifyLevel::SinkInversions);
        assert!(!has_inverse_nodes(sunk.node.as_ref()));
        assert_eq!(sunk, action);

        let flat = action.simplify(SimplifyLevel::Flatten);
        assert!(!flat.is_lazy());
        assert_eq!(flat.moves(), sunk.simplify(SimplifyLevel::Flatten).moves());
    }

    #[test]
    fn shared_formulas_are_rewritten_once() {
        let group = group(3, 2);
        let a = group.parse("R R' U F").unwrap().lazy();
        let shared = a.multiply(&a);
        assert_eq!(shared.count(), 8);

        let simplified = shared.simplify(SimplifyLevel::CancelMoves);
        let Formula::Product(left, right) = &simplified.node.formula else {
            panic!("expected a product");
        };
        assert!(Rc::ptr_eq(left, right));
        assert_eq!(simplified.count(), 4);
        assert_eq!(simplified.moves(), group.parse("U F U F").unwrap().moves());
    }
}
