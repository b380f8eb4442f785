//! Explicit owners of computed layouts: a signature-keyed [LayoutCache] and a
//! name-keyed [TypeRegistry] built on top of it.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::{
    abi::TargetAbi,
    errors::LayoutError,
    field::{AggregateKind, FieldDescriptor},
    layout::{AggregateLayout, compute_layout},
};

type Signature = (AggregateKind, Vec<FieldDescriptor>);

/// Memoizes [compute_layout] for one target ABI, keyed by the field-sequence signature.
#[derive(Debug)]
pub struct LayoutCache {
    abi: TargetAbi,
    entries: HashMap<Signature, Arc<AggregateLayout>>,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    pub fn new(abi: TargetAbi) -> Self {
        LayoutCache {
            abi,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn abi(&self) -> &TargetAbi {
        &self.abi
    }

    /// Returns the cached layout for this signature, computing it on first use.
    /// Failures are not cached.
    pub fn get_or_compute(
        &mut self,
        kind: AggregateKind,
        fields: &[FieldDescriptor],
    ) -> Result<Arc<AggregateLayout>, LayoutError> {
        let key = (kind, fields.to_vec());

        if let Some(layout) = self.entries.get(&key) {
            self.hits += 1;
            debug!("layout cache hit ({} fields)", fields.len());
            return Ok(Arc::clone(layout));
        }

        self.misses += 1;
        let layout = Arc::new(compute_layout(kind, fields, &self.abi)?);
        self.entries.insert(key, Arc::clone(&layout));

        Ok(layout)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Drops every cached layout. Layouts already handed out stay valid.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Named aggregate types of one target, used to resolve pointer targets.
#[derive(Debug)]
pub struct TypeRegistry {
    cache: LayoutCache,
    types: HashMap<String, Arc<AggregateLayout>>,
}

impl TypeRegistry {
    pub fn new(abi: TargetAbi) -> Self {
        TypeRegistry {
            cache: LayoutCache::new(abi),
            types: HashMap::new(),
        }
    }

    pub fn abi(&self) -> &TargetAbi {
        self.cache.abi()
    }

    pub fn cache(&self) -> &LayoutCache {
        &self.cache
    }

    /// Computes and registers the layout of a named aggregate.
    ///
    /// Pointer fields may name aggregates that are defined later, including
    /// `name` itself.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        kind: AggregateKind,
        fields: &[FieldDescriptor],
    ) -> Result<Arc<AggregateLayout>, LayoutError> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(LayoutError::DuplicateAggregate(name));
        }

        let layout = self.cache.get_or_compute(kind, fields)?;
        debug!("registered `{}` (size {})", name, layout.size);
        self.types.insert(name, Arc::clone(&layout));

        Ok(layout)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AggregateLayout>> {
        self.types.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&Arc<AggregateLayout>, LayoutError> {
        self.get(name)
            .ok_or_else(|| LayoutError::UnknownAggregate(name.to_string()))
    }

    /// Builds a registry from a deserialized type file, defining aggregates in order.
    #[cfg(feature = "serde")]
    pub fn load(def: crate::serde::TypesDef) -> Result<Self, LayoutError> {
        let abi = def.abi.map(TargetAbi::from).unwrap_or_default();
        let mut registry = TypeRegistry::new(abi);

        for aggregate in def.aggregates {
            let fields = aggregate
                .fields
                .into_iter()
                .map(|f| {
                    let kind = registry.field_kind_from_def(f.kind)?;
                    Ok(FieldDescriptor { name: f.name, kind })
                })
                .collect::<Result<Vec<_>, LayoutError>>()?;

            registry.define(aggregate.name, aggregate.kind.into(), &fields)?;
        }

        Ok(registry)
    }

    #[cfg(feature = "serde")]
    fn field_kind_from_def(&self, def: crate::serde::FieldKindDef) -> Result<crate::field::FieldKind, LayoutError> {
        use crate::{
            field::{FieldKind, PointerTarget},
            primitive::PrimitiveKind,
            serde::FieldKindDef,
        };

        let abi = self.abi();
        Ok(match def {
            FieldKindDef::Void => FieldKind::Void,
            FieldKindDef::Primitive { primitive } => FieldKind::Primitive(PrimitiveKind::from_def(primitive, abi)),
            FieldKindDef::Aggregate { name } => FieldKind::Aggregate(Arc::clone(self.resolve(&name)?)),
            FieldKindDef::Array { element, count } => FieldKind::Array {
                element: Box::new(self.field_kind_from_def(*element)?),
                count,
            },
            FieldKindDef::Pointer { target } => FieldKind::Pointer(PointerTarget::from_def(target, abi)),
            FieldKindDef::BitField { base, width } => FieldKind::BitField {
                base: PrimitiveKind::from_def(base, abi),
                width,
            },
        })
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
