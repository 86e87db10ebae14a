// Copyright 2014 The Prometheus Authors
// Copyright 2016 PingCAP, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::btree_map::Entry as BEntry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::counter::{Counter, CounterVec};
use crate::desc::Desc;
use crate::errors::{Error, Result};
use crate::gauge::{Gauge, GaugeVec};
use crate::histogram::{Histogram, HistogramOpts, HistogramVec};
use crate::metrics::{Collector, Opts};
use crate::push::PushController;
use crate::scrub::{scrub_label_value, scrub_name};
use crate::snapshot::MetricFamily;

#[derive(Default)]
struct RegistryCore {
    collectors_by_name: BTreeMap<String, Vec<Box<dyn Collector>>>,
    dim_hashes_by_name: HashMap<String, u64>,
    descs_by_name: HashMap<String, Vec<Desc>>,
    desc_ids: HashSet<u64>,
}

/// True if `scalar` sits inside the label space `vector` covers: the
/// scalar's label names are exactly the vector's constant plus variable
/// names, and every constant pair of the vector appears on the scalar with
/// the same value. The remaining scalar labels then read as one positional
/// assignment of the vector's variable labels.
fn vector_covers(vector: &Desc, scalar: &Desc) -> bool {
    if vector.label_name_set() != scalar.label_name_set() {
        return false;
    }

    vector
        .const_label_pairs
        .iter()
        .all(|p| scalar.const_label_pairs.iter().any(|s| s == p))
}

impl RegistryCore {
    fn register(&mut self, c: Box<dyn Collector>) -> Result<()> {
        let mut desc_id_set = HashSet::new();
        for desc in c.desc() {
            // Is the name + constant label values + variable label names
            // combination unique, both in the registry and within this
            // collector?
            if self.desc_ids.contains(&desc.id) || !desc_id_set.insert(desc.id) {
                return Err(Error::IdentityConflict(desc.name.clone()));
            }

            // A name pins its label-name schema and help string for the
            // lifetime of the registry.
            if let Some(hash) = self.dim_hashes_by_name.get(&desc.name) {
                if *hash != desc.dim_hash {
                    return Err(Error::DimensionMismatch(desc.name.clone()));
                }
            }

            // Vectors own their dimensions: a scalar may not occupy a label
            // set a vector child could materialize, and a vector may not
            // cover an already registered scalar.
            if let Some(existing) = self.descs_by_name.get(&desc.name) {
                let conflict = if desc.is_vector() {
                    existing
                        .iter()
                        .any(|d| !d.is_vector() && vector_covers(desc, d))
                } else {
                    existing
                        .iter()
                        .any(|d| d.is_vector() && vector_covers(d, desc))
                };
                if conflict {
                    return Err(Error::VectorOwnership(desc.name.clone()));
                }
            }
        }

        for desc in c.desc() {
            self.desc_ids.insert(desc.id);
            self.dim_hashes_by_name
                .insert(desc.name.clone(), desc.dim_hash);
            self.descs_by_name
                .entry(desc.name.clone())
                .or_insert_with(Vec::new)
                .push(desc.clone());
        }

        let name = c
            .desc()
            .first()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        self.collectors_by_name
            .entry(name)
            .or_insert_with(Vec::new)
            .push(c);
        Ok(())
    }

    fn gather(&self, for_push: bool) -> Vec<MetricFamily> {
        let mut mf_by_name = BTreeMap::new();

        for collectors in self.collectors_by_name.values() {
            for c in collectors {
                if for_push && c.desc().iter().any(|d| d.push_disabled) {
                    continue;
                }
                for mf in c.collect() {
                    if mf.samples.is_empty() {
                        continue;
                    }
                    match mf_by_name.entry(mf.name.clone()) {
                        BEntry::Vacant(entry) => {
                            entry.insert(mf);
                        }
                        BEntry::Occupied(mut entry) => {
                            // TODO: check type consistency when merging
                            // same-name collectors.
                            let existent_mf: &mut MetricFamily = entry.get_mut();
                            existent_mf.samples.extend(mf.samples);
                        }
                    }
                }
            }
        }

        // Within a family, order samples lexicographically by their label
        // values so repeated gathers of identical state are identical.
        let mut families: Vec<MetricFamily> = mf_by_name.into_iter().map(|(_, mf)| mf).collect();
        for mf in &mut families {
            mf.sort_samples();
        }
        families
    }
}

/// `Registry` is the root of metric identity. It owns every metric created
/// from it, enforces uniqueness and label compatibility under concurrent
/// registration, and projects the accumulated state for scrape and push.
///
/// A registry handle is a cheap clone; `labeled` views share the underlying
/// state and differ only in the constant labels they stamp onto subsequent
/// registrations.
#[derive(Clone)]
pub struct Registry {
    r: Arc<RwLock<RegistryCore>>,
    base_labels: HashMap<String, String>,
}

impl Registry {
    /// `new` creates a fresh registry together with its push controller.
    /// The two are peers sharing the same state by construction.
    pub fn new() -> (Registry, PushController) {
        let registry = Registry {
            r: Arc::new(RwLock::new(RegistryCore::default())),
            base_labels: HashMap::new(),
        };
        let controller = PushController::new(registry.clone());
        (registry, controller)
    }

    /// `labeled` returns a view of this registry whose registrations
    /// automatically carry the supplied constant labels in addition to any
    /// the view already has. Keys that collide after scrubbing, within the
    /// supplied set or with the view's own labels, are rejected.
    pub fn labeled(&self, labels: HashMap<String, String>) -> Result<Registry> {
        let mut base_labels = self.base_labels.clone();
        for (name, value) in labels {
            let scrubbed = scrub_name(&name);
            if scrubbed.is_empty() {
                return Err(Error::InvalidLabel(name));
            }
            if base_labels
                .insert(scrubbed.clone(), scrub_label_value(&value))
                .is_some()
            {
                return Err(Error::DuplicateLabelAfterScrub(scrubbed));
            }
        }

        Ok(Registry {
            r: Arc::clone(&self.r),
            base_labels,
        })
    }

    /// `register` registers a new Collector to be included in the scrape
    /// and push projections. It returns an error if the collector's
    /// descriptors do not fulfill the uniqueness and compatibility criteria
    /// of the registry.
    pub fn register(&self, c: Box<dyn Collector>) -> Result<()> {
        self.r.write().register(c)
    }

    /// `new_counter` creates, registers and returns a [`Counter`].
    pub fn new_counter(&self, opts: Opts) -> Result<Counter> {
        let opts = self.merge_base_labels(opts)?;
        let counter = Counter::with_opts(opts)?;
        self.register(Box::new(counter.clone()))?;
        Ok(counter)
    }

    /// `new_gauge` creates, registers and returns a [`Gauge`].
    pub fn new_gauge(&self, opts: Opts) -> Result<Gauge> {
        let opts = self.merge_base_labels(opts)?;
        let gauge = Gauge::with_opts(opts)?;
        self.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    /// `new_histogram` creates, registers and returns a [`Histogram`].
    pub fn new_histogram(&self, opts: HistogramOpts) -> Result<Histogram> {
        let mut opts = opts;
        opts.common_opts = self.merge_base_labels(opts.common_opts)?;
        let histogram = Histogram::with_opts(opts)?;
        self.register(Box::new(histogram.clone()))?;
        Ok(histogram)
    }

    /// `new_counter_vec` creates, registers and returns a [`CounterVec`]
    /// partitioned by `opts.variable_labels`, which must be non-empty.
    pub fn new_counter_vec(&self, opts: Opts) -> Result<CounterVec> {
        let mut opts = self.merge_base_labels(opts)?;
        let variable_labels = mem::take(&mut opts.variable_labels);
        if variable_labels.is_empty() {
            return Err(Error::VariableLabelsMissing);
        }
        let names: Vec<&str> = variable_labels.iter().map(|l| l.as_str()).collect();
        let vec = CounterVec::new(opts, &names)?;
        self.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    /// `new_gauge_vec` creates, registers and returns a [`GaugeVec`]
    /// partitioned by `opts.variable_labels`, which must be non-empty.
    pub fn new_gauge_vec(&self, opts: Opts) -> Result<GaugeVec> {
        let mut opts = self.merge_base_labels(opts)?;
        let variable_labels = mem::take(&mut opts.variable_labels);
        if variable_labels.is_empty() {
            return Err(Error::VariableLabelsMissing);
        }
        let names: Vec<&str> = variable_labels.iter().map(|l| l.as_str()).collect();
        let vec = GaugeVec::new(opts, &names)?;
        self.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    /// `new_histogram_vec` creates, registers and returns a
    /// [`HistogramVec`] partitioned by the variable labels of
    /// `opts.common_opts`, which must be non-empty.
    pub fn new_histogram_vec(&self, opts: HistogramOpts) -> Result<HistogramVec> {
        let mut opts = opts;
        opts.common_opts = self.merge_base_labels(opts.common_opts)?;
        let variable_labels = mem::take(&mut opts.common_opts.variable_labels);
        if variable_labels.is_empty() {
            return Err(Error::VariableLabelsMissing);
        }
        let names: Vec<&str> = variable_labels.iter().map(|l| l.as_str()).collect();
        let vec = HistogramVec::new(opts, &names)?;
        self.register(Box::new(vec.clone()))?;
        Ok(vec)
    }

    /// `gather` walks every registered metric and captures its state as a
    /// list of snapshot families, sorted by scrubbed name, samples sorted
    /// by label values. Gathering twice with no intervening mutation yields
    /// identical output.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.r.read().gather(false)
    }

    /// Like `gather`, but skips metrics registered with `disable_push`.
    pub(crate) fn gather_pushable(&self) -> Vec<MetricFamily> {
        self.r.read().gather(true)
    }

    fn merge_base_labels(&self, opts: Opts) -> Result<Opts> {
        if self.base_labels.is_empty() {
            return Ok(opts);
        }

        let mut merged: HashMap<String, String> = HashMap::with_capacity(
            self.base_labels.len() + opts.const_labels.len(),
        );
        for (name, value) in &opts.const_labels {
            let scrubbed = scrub_name(name);
            if scrubbed.is_empty() {
                return Err(Error::InvalidLabel(name.clone()));
            }
            if merged
                .insert(scrubbed.clone(), scrub_label_value(value))
                .is_some()
            {
                return Err(Error::DuplicateLabelAfterScrub(scrubbed));
            }
        }
        for (name, value) in &self.base_labels {
            if merged.insert(name.clone(), value.clone()).is_some() {
                return Err(Error::DuplicateLabelAfterScrub(name.clone()));
            }
        }

        Ok(opts.const_labels(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SampleValue;
    use std::thread;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_registry_gather() {
        let (r, _) = Registry::new();

        let counter = r
            .new_counter(Opts::new("test_counter", "test help"))
            .unwrap();
        counter.inc();

        let r1 = r.clone();
        let handler = thread::spawn(move || {
            let families = r1.gather();
            assert_eq!(families.len(), 1);
            assert_eq!(families[0].samples[0].value, SampleValue::Counter(1));
        });
        assert!(handler.join().is_ok());
    }

    #[test]
    fn test_identity_conflict_on_identical_opts() {
        let (r, _) = Registry::new();

        let opts = Opts::new("test_counter", "test help");
        r.new_counter(opts.clone()).unwrap();
        match r.new_counter(opts) {
            Err(Error::IdentityConflict(_)) => {}
            other => panic!("expected IdentityConflict, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_identity_conflict_across_kinds() {
        let (r, _) = Registry::new();

        r.new_counter(Opts::new("foo", "test help")).unwrap();
        match r.new_gauge(Opts::new("foo", "test help")) {
            Err(Error::IdentityConflict(_)) => {}
            other => panic!("expected IdentityConflict, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_scrub_collision_rejected() {
        let (r, _) = Registry::new();

        r.new_counter(Opts::new("foo&bar", "test help")).unwrap();
        match r.new_counter(Opts::new("foo_bar", "test help")) {
            Err(Error::IdentityConflict(_)) => {}
            other => panic!("expected IdentityConflict, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_same_dimensions_different_values() {
        let (r, _) = Registry::new();

        let c1 = r
            .new_counter(
                Opts::new("requests", "test help").const_labels(labels(&[("service", "users")])),
            )
            .unwrap();
        let c2 = r
            .new_counter(
                Opts::new("requests", "test help").const_labels(labels(&[("service", "orders")])),
            )
            .unwrap();
        c1.inc();
        c2.inc_by(2);

        let families = r.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 2);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (r, _) = Registry::new();

        r.new_counter(
            Opts::new("requests", "test help").const_labels(labels(&[("service", "users")])),
        )
        .unwrap();

        // Added dimension.
        match r.new_counter(
            Opts::new("requests", "test help")
                .const_labels(labels(&[("service", "users"), ("extra", "x")])),
        ) {
            Err(Error::DimensionMismatch(_)) => {}
            other => panic!("expected DimensionMismatch, got {:?}", other.map(|_| ())),
        }

        // Removed dimension.
        match r.new_counter(Opts::new("requests", "test help")) {
            Err(Error::DimensionMismatch(_)) => {}
            other => panic!("expected DimensionMismatch, got {:?}", other.map(|_| ())),
        }

        // A help change alone does not change the identity: with the same
        // constant label values this is an identity conflict.
        match r.new_counter(
            Opts::new("requests", "other help").const_labels(labels(&[("service", "users")])),
        ) {
            Err(Error::IdentityConflict(_)) => {}
            other => panic!("expected IdentityConflict, got {:?}", other.map(|_| ())),
        }

        // With different constant label values the identity is new, and the
        // help mismatch is caught as a schema mismatch.
        match r.new_counter(
            Opts::new("requests", "other help").const_labels(labels(&[("service", "orders")])),
        ) {
            Err(Error::DimensionMismatch(_)) => {}
            other => panic!("expected DimensionMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_vector_ownership() {
        let (r, _) = Registry::new();

        r.new_counter_vec(
            Opts::new("ownership", "test help")
                .const_labels(labels(&[("foo", "bar")]))
                .variable_label("baz"),
        )
        .unwrap();

        match r.new_counter(
            Opts::new("ownership", "test help")
                .const_labels(labels(&[("foo", "bar"), ("baz", "quux")])),
        ) {
            Err(Error::VectorOwnership(_)) => {}
            other => panic!("expected VectorOwnership, got {:?}", other.map(|_| ())),
        }

        // A scalar outside the vector's constant-label space is fine.
        r.new_counter(
            Opts::new("ownership", "test help")
                .const_labels(labels(&[("foo", "other"), ("baz", "quux")])),
        )
        .unwrap();
    }

    #[test]
    fn test_vector_ownership_reverse() {
        let (r, _) = Registry::new();

        r.new_counter(
            Opts::new("ownership", "test help")
                .const_labels(labels(&[("foo", "bar"), ("baz", "quux")])),
        )
        .unwrap();

        match r.new_counter_vec(
            Opts::new("ownership", "test help")
                .const_labels(labels(&[("foo", "bar")]))
                .variable_label("baz"),
        ) {
            Err(Error::VectorOwnership(_)) => {}
            other => panic!("expected VectorOwnership, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_duplicate_const_labels_in_one_opts() {
        let (r, _) = Registry::new();

        match r.new_counter(
            Opts::new("test", "test help")
                .const_labels(labels(&[("b_r", "baz"), ("b&r", "baz")])),
        ) {
            Err(Error::DuplicateLabelAfterScrub(_)) => {}
            other => panic!(
                "expected DuplicateLabelAfterScrub, got {:?}",
                other.map(|_| ())
            ),
        }
    }

    #[test]
    fn test_scalar_with_variable_labels_rejected() {
        let (r, _) = Registry::new();
        match r.new_counter(Opts::new("test", "test help").variable_label("code")) {
            Err(Error::VariableLabelsForbidden) => {}
            other => panic!(
                "expected VariableLabelsForbidden, got {:?}",
                other.map(|_| ())
            ),
        }
    }

    #[test]
    fn test_vector_without_variable_labels_rejected() {
        let (r, _) = Registry::new();
        match r.new_counter_vec(Opts::new("test", "test help")) {
            Err(Error::VariableLabelsMissing) => {}
            other => panic!("expected VariableLabelsMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_labeled_views() {
        let (r, _) = Registry::new();
        let users = r.labeled(labels(&[("service", "users")])).unwrap();

        let counter = users
            .new_counter(Opts::new("requests", "test help"))
            .unwrap();
        counter.inc();

        let families = r.gather();
        assert_eq!(families.len(), 1);
        let pairs = &families[0].samples[0].label_pairs;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].name, "service");
        assert_eq!(pairs[0].value, "users");

        // Nested views accumulate labels.
        let nested = users.labeled(labels(&[("zone", "eu")])).unwrap();
        let gauge = nested.new_gauge(Opts::new("depth", "test help")).unwrap();
        gauge.set(1);
        assert_eq!(r.gather().len(), 2);

        // Colliding keys are rejected, in the view and against opts labels.
        assert!(users.labeled(labels(&[("service", "orders")])).is_err());
        match users.new_counter(
            Opts::new("other", "test help").const_labels(labels(&[("service", "orders")])),
        ) {
            Err(Error::DuplicateLabelAfterScrub(_)) => {}
            other => panic!(
                "expected DuplicateLabelAfterScrub, got {:?}",
                other.map(|_| ())
            ),
        }
    }

    #[test]
    fn test_gather_order() {
        let (r, _) = Registry::new();

        r.new_counter(Opts::new("test_b_counter", "test help"))
            .unwrap();
        r.new_counter(Opts::new("test_2_counter", "test help"))
            .unwrap();
        r.new_counter(Opts::new("test_a_counter", "test help"))
            .unwrap();

        let mfs = r.gather();
        assert_eq!(mfs.len(), 3);
        assert_eq!(mfs[0].name, "test_2_counter");
        assert_eq!(mfs[1].name, "test_a_counter");
        assert_eq!(mfs[2].name, "test_b_counter");
    }

    #[test]
    fn test_gather_skips_empty_vectors() {
        let (r, _) = Registry::new();
        r.new_counter_vec(Opts::new("empty_vec", "test help").variable_label("l"))
            .unwrap();
        assert!(r.gather().is_empty());
    }

    #[test]
    fn test_disable_push_visible_to_scrape() {
        let (r, _) = Registry::new();
        let c = r
            .new_counter(Opts::new("scrape_only", "test help").disable_push(true))
            .unwrap();
        c.inc();

        assert_eq!(r.gather().len(), 1);
        assert!(r.gather_pushable().is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let (r, _) = Registry::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = r.clone();
                thread::spawn(move || r.new_counter(Opts::new("contended", "test help")).is_ok())
            })
            .collect();

        // Exactly one registration wins, the rest observe IdentityConflict.
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|registered| *registered)
            .count();
        assert_eq!(ok, 1);
        assert_eq!(r.gather().len(), 1);
    }
}
