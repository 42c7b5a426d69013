use crate::matching::normalize::Normalizer;
use crate::matching::similarity::SimilarityService;
use crate::models::Product;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Both scores must be strictly above these to match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    pub name: f64,
    pub category: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            name: 0.6,
            category: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupingStrategy {
    /// Each unused record in order absorbs every later unused record it matches
    #[default]
    Greedy,
    /// Connected components of the match graph; order-independent
    Connected,
}

/// A record with its normalized name and category text
#[derive(Debug, Clone)]
pub struct NormalizedProduct<'a> {
    pub product: &'a Product,
    pub name: String,
    pub category: String,
    /// Raw category labels and path fields, as shown in debug output
    pub raw_categories: String,
}

/// Similarity features of one record, built once per grouping run
struct Prepared<F> {
    name: F,
    category: F,
}

/// Records believed to be the same item sold by different suppliers
#[derive(Debug, Clone)]
pub struct ProductGroup<'a> {
    pub members: Vec<&'a Product>,
}

impl<'a> ProductGroup<'a> {
    /// Name of the first member
    pub fn title(&self) -> &str {
        self.members.first().map(|p| p.name.as_str()).unwrap_or_default()
    }

    pub fn supplier_count(&self) -> usize {
        self.members
            .iter()
            .map(|p| p.supplier.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Groups equivalent products across suppliers
pub struct ProductMatcher<S> {
    similarity: S,
    normalizer: Normalizer,
    thresholds: MatchThresholds,
    strategy: GroupingStrategy,
}

impl<S: SimilarityService> ProductMatcher<S> {
    pub fn new(similarity: S) -> Self {
        Self {
            similarity,
            normalizer: Normalizer::new(),
            thresholds: MatchThresholds::default(),
            strategy: GroupingStrategy::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_strategy(mut self, strategy: GroupingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }

    pub fn normalize_all<'a>(&self, products: &'a [Product]) -> Vec<NormalizedProduct<'a>> {
        products.iter().map(|p| self.normalize_one(p)).collect()
    }

    fn normalize_one<'a>(&self, product: &'a Product) -> NormalizedProduct<'a> {
        let labels: BTreeSet<&str> = product
            .category
            .labels()
            .chain(product.path_fields())
            .collect();
        let category_text = labels.into_iter().collect::<Vec<_>>().join(" ");

        let raw_categories = product
            .category
            .labels()
            .chain(product.path_fields())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        NormalizedProduct {
            product,
            name: self.normalizer.normalize(&product.name),
            category: self.normalizer.normalize(&category_text),
            raw_categories,
        }
    }

    fn prepare(&self, normalized: &[NormalizedProduct<'_>]) -> Vec<Prepared<S::Features>> {
        normalized
            .iter()
            .map(|n| Prepared {
                name: self.similarity.features(&n.name),
                category: self.similarity.features(&n.category),
            })
            .collect()
    }

    fn is_match(&self, a: &Prepared<S::Features>, b: &Prepared<S::Features>) -> bool {
        let name = self.similarity.score(&a.name, &b.name);
        if name <= self.thresholds.name {
            return false;
        }
        let category = self.similarity.score(&a.category, &b.category);
        category > self.thresholds.category
    }

    /// Groups with more than one distinct supplier, ordered by first member
    pub fn group<'a>(&self, products: &'a [Product]) -> Vec<ProductGroup<'a>> {
        let normalized = self.normalize_all(products);
        let prepared = self.prepare(&normalized);
        let indices = match self.strategy {
            GroupingStrategy::Greedy => self.greedy(&prepared),
            GroupingStrategy::Connected => self.connected(&prepared),
        };

        let groups: Vec<ProductGroup<'a>> = indices
            .into_iter()
            .map(|members| ProductGroup {
                members: members.into_iter().map(|i| normalized[i].product).collect(),
            })
            .filter(|group| group.supplier_count() > 1)
            .collect();
        debug!(
            "Grouped {} products into {} cross-supplier groups ({:?})",
            products.len(),
            groups.len(),
            self.strategy
        );
        groups
    }

    fn greedy(&self, prepared: &[Prepared<S::Features>]) -> Vec<Vec<usize>> {
        let mut used = vec![false; prepared.len()];
        let mut groups = Vec::new();
        for i in 0..prepared.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let mut group = vec![i];
            for j in (i + 1)..prepared.len() {
                if !used[j] && self.is_match(&prepared[i], &prepared[j]) {
                    used[j] = true;
                    group.push(j);
                }
            }
            groups.push(group);
        }
        groups
    }

    fn connected(&self, prepared: &[Prepared<S::Features>]) -> Vec<Vec<usize>> {
        let mut sets = DisjointSet::new(prepared.len());
        for i in 0..prepared.len() {
            for j in (i + 1)..prepared.len() {
                if self.is_match(&prepared[i], &prepared[j]) {
                    sets.union(i, j);
                }
            }
        }

        // Components in order of their lowest index
        let mut slot_of_root = vec![usize::MAX; prepared.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..prepared.len() {
            let root = sets.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(i);
        }
        groups
    }

    /// Normalized view of records whose normalized name or category
    /// contains the normalized keyword
    pub fn debug_matches<'a>(
        &self,
        products: &'a [Product],
        keyword: &str,
    ) -> Vec<NormalizedProduct<'a>> {
        let keyword = self.normalizer.normalize(keyword);
        self.normalize_all(products)
            .into_iter()
            .filter(|n| n.name.contains(&keyword) || n.category.contains(&keyword))
            .collect()
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the lower index as root
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::similarity::{TermVector, TermVectorSimilarity};
    use crate::models::fixtures::product;
    use crate::models::Category;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores looked up by unordered pair; identical text scores 1.0, anything else 0.0
    #[derive(Default)]
    struct TableSimilarity(HashMap<(String, String), f64>);

    impl TableSimilarity {
        fn with(mut self, a: &str, b: &str, score: f64) -> Self {
            self.0.insert((a.to_string(), b.to_string()), score);
            self.0.insert((b.to_string(), a.to_string()), score);
            self
        }
    }

    impl SimilarityService for TableSimilarity {
        type Features = String;

        fn features(&self, text: &str) -> String {
            text.trim().to_string()
        }

        fn score(&self, a: &String, b: &String) -> f64 {
            if a.is_empty() || b.is_empty() {
                return 0.0;
            }
            if a == b {
                return 1.0;
            }
            self.0.get(&(a.clone(), b.clone())).copied().unwrap_or(0.0)
        }
    }

    /// Counts how many texts get vectorized
    #[derive(Default)]
    struct CountingSimilarity {
        inner: TermVectorSimilarity,
        vectorized: AtomicUsize,
    }

    impl SimilarityService for CountingSimilarity {
        type Features = TermVector;

        fn features(&self, text: &str) -> TermVector {
            self.vectorized.fetch_add(1, Ordering::Relaxed);
            self.inner.features(text)
        }

        fn score(&self, a: &TermVector, b: &TermVector) -> f64 {
            self.inner.score(a, b)
        }
    }

    fn item(name: &str, supplier: &str, category: &str) -> Product {
        let mut p = product(name, supplier, &format!("https://{supplier}/{name}"));
        p.category = Category::One(category.to_string());
        p
    }

    fn names<'a>(group: &ProductGroup<'a>) -> Vec<&'a str> {
        group.members.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn groups_pair_above_both_thresholds() {
        let sim = TableSimilarity::default()
            .with("spa gonflable", "spa gonflable rond", 0.62)
            .with("spa", "piscine spa", 0.55);
        let products = vec![
            item("Spa gonflable", "Castorama", "Spa"),
            item("Spa gonflable rond", "ManoMano", "Piscine spa"),
        ];

        let groups = ProductMatcher::new(sim).group(&products);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title(), "Spa gonflable");
        assert_eq!(groups[0].supplier_count(), 2);
    }

    #[test]
    fn thresholds_are_strict() {
        let products = vec![
            item("Vasque", "Castorama", "Lavabo"),
            item("Vasque ronde", "ManoMano", "Lavabo"),
        ];

        let at_name_threshold = TableSimilarity::default().with("vasque", "vasque ronde", 0.6);
        assert!(ProductMatcher::new(at_name_threshold).group(&products).is_empty());

        let products = vec![
            item("Vasque", "Castorama", "Lavabo"),
            item("Vasque", "ManoMano", "Meuble lavabo"),
        ];
        let at_category_threshold =
            TableSimilarity::default().with("lavabo", "meuble lavabo", 0.5);
        assert!(ProductMatcher::new(at_category_threshold).group(&products).is_empty());
    }

    #[test]
    fn single_supplier_groups_are_dropped() {
        let products = vec![
            item("Vasque", "ManoMano", "Lavabo"),
            item("Vasque", "ManoMano", "Lavabo"),
        ];
        let groups = ProductMatcher::new(TableSimilarity::default()).group(&products);
        assert!(groups.is_empty());
    }

    #[test]
    fn empty_names_never_match() {
        let products = vec![item("", "Castorama", "Lavabo"), item("", "ManoMano", "Lavabo")];
        let groups = ProductMatcher::new(TableSimilarity::default()).group(&products);
        assert!(groups.is_empty());
    }

    #[test]
    fn greedy_and_connected_differ_on_chains() {
        // a~b and b~c but not a~c
        let sim = || {
            TableSimilarity::default()
                .with("alpha", "beta", 0.9)
                .with("beta", "gamma", 0.9)
        };
        let products = vec![
            item("Alpha", "Castorama", "wc"),
            item("Beta", "Castorama", "wc"),
            item("Gamma", "ManoMano", "wc"),
        ];

        let greedy = ProductMatcher::new(sim()).group(&products);
        assert!(greedy.is_empty(), "alpha absorbs beta, gamma is left alone");

        let connected = ProductMatcher::new(sim())
            .with_strategy(GroupingStrategy::Connected)
            .group(&products);
        assert_eq!(connected.len(), 1);
        assert_eq!(names(&connected[0]), vec!["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn grouping_is_deterministic() {
        let products = vec![
            item("Mitigeur lavabo chromé", "Castorama", "Robinetterie"),
            item("Mitigeur lavabo chrome", "ManoMano", "Robinetterie"),
            item("Perceuse visseuse", "ManoMano", "Outillage"),
            item("Perceuse visseuse sans fil", "Castorama", "Outillage"),
        ];
        let matcher = ProductMatcher::new(TermVectorSimilarity::new());
        let first: Vec<Vec<&str>> = matcher.group(&products).iter().map(names).collect();
        let second: Vec<Vec<&str>> = matcher.group(&products).iter().map(names).collect();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                vec!["Mitigeur lavabo chromé", "Mitigeur lavabo chrome"],
                vec!["Perceuse visseuse", "Perceuse visseuse sans fil"],
            ]
        );
    }

    #[test]
    fn each_record_is_vectorized_once_per_grouping() {
        let products = vec![
            item("Mitigeur lavabo chromé", "Castorama", "Robinetterie"),
            item("Mitigeur lavabo chrome", "ManoMano", "Robinetterie"),
            item("Perceuse visseuse", "ManoMano", "Outillage"),
            item("Perceuse visseuse sans fil", "Castorama", "Outillage"),
            item("Vasque ronde", "ManoMano", "Lavabo"),
        ];
        for strategy in [GroupingStrategy::Greedy, GroupingStrategy::Connected] {
            let matcher =
                ProductMatcher::new(CountingSimilarity::default()).with_strategy(strategy);
            let groups = matcher.group(&products);
            assert_eq!(groups.len(), 2);
            // one name and one category vector per record
            assert_eq!(matcher.similarity.vectorized.load(Ordering::Relaxed), 10);
        }
    }

    #[test]
    fn category_text_merges_labels_and_path_fields() {
        let mut p = item("Carreau", "Castorama", "");
        p.category = Category::Many(vec![Some("Carrelage".into()), Some("Sol".into()), None]);
        p.category_primary = Some("Carrelage".into());
        p.category_secondary = Some("Sol".into());

        let matcher = ProductMatcher::new(TermVectorSimilarity::new());
        let products = vec![p];
        let normalized = matcher.normalize_all(&products);
        assert_eq!(normalized[0].category, "carrelage sol");
        assert_eq!(normalized[0].name, "carreau");
    }

    #[test]
    fn debug_matches_filters_on_normalized_keyword() {
        let products = vec![
            item("Spa gonflable", "Castorama", "Jardin"),
            item("Perceuse", "ManoMano", "Outillage"),
            item("Bâche", "ManoMano", "Spas"),
        ];
        let matcher = ProductMatcher::new(TermVectorSimilarity::new());
        let hits = matcher.debug_matches(&products, "Spas");
        let hit_names: Vec<_> = hits.iter().map(|n| n.product.name.as_str()).collect();
        assert_eq!(hit_names, vec!["Spa gonflable", "Bâche"]);
    }
}
