//! Collaborator contracts the filters depend on, plus in-memory
//! implementations for tests and embedding hosts that assemble their
//! metadata up front.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::filters::{MethodVisibility, PointcutFilter};
use crate::value::Value;

/// Reflection data for a class or method could not be produced. Filters
/// swallow this and treat the query as "no match".
#[derive(Debug, Error)]
#[error("no metadata available for {subject}")]
pub struct MetadataUnavailable {
    subject: String,
}

impl MetadataUnavailable {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        MetadataUnavailable {
            subject: subject.into(),
        }
    }
}

/// One annotation instance with its named properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    properties: BTreeMap<String, Value>,
}

impl Annotation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Declared parameter of a method, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterInfo {
    pub position: usize,
    pub type_name: Option<String>,
}

/// Class and method reflection as the filters need it.
pub trait MetadataProvider: Send + Sync {
    /// All instances of the given annotation type on a class, in
    /// declaration order.
    fn class_annotations(
        &self,
        class_name: &str,
        annotation_type: &str,
    ) -> Result<Vec<Annotation>, MetadataUnavailable>;

    /// Every class carrying at least one instance of the annotation type.
    fn class_names_by_annotation(&self, annotation_type: &str) -> Vec<String>;

    fn is_interface(&self, type_name: &str) -> bool;

    fn is_class(&self, type_name: &str) -> bool;

    /// Classes implementing the interface, directly or through a parent.
    fn implementation_class_names(&self, interface_name: &str) -> Vec<String>;

    /// Classes extending the class, transitively.
    fn sub_class_names(&self, class_name: &str) -> Vec<String>;

    /// All instances of the given annotation type on a method.
    fn method_annotations(
        &self,
        class_name: &str,
        method_name: &str,
        annotation_type: &str,
    ) -> Result<Vec<Annotation>, MetadataUnavailable>;

    /// Every class declaring at least one method carrying the annotation
    /// type.
    fn classes_containing_methods_annotated_with(&self, annotation_type: &str) -> Vec<String>;

    fn is_method_public(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<bool, MetadataUnavailable>;

    fn is_method_protected(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<bool, MetadataUnavailable>;

    /// The method's declared parameters keyed by name.
    fn method_parameters(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<BTreeMap<String, ParameterInfo>, MetadataUnavailable>;
}

/// Read access to the host's configuration, addressed by dotted paths.
pub trait ConfigurationProvider: Send + Sync {
    fn setting(&self, path: &str) -> Option<Value>;
}

/// Looks up named pointcuts declared on aspect classes, for
/// `Aspect->pointcut` references inside expressions.
pub trait PointcutRegistry: Send + Sync {
    fn find_pointcut(
        &self,
        aspect_class_name: &str,
        pointcut_method_name: &str,
    ) -> Option<Arc<dyn PointcutFilter>>;
}

/// Resolves `filter(...)` designators to host-registered custom filters.
pub trait CustomFilterResolver: Send + Sync {
    fn custom_filter(&self, name: &str) -> Option<Arc<dyn PointcutFilter>>;
}

/// The collaborator handles a parser needs to build filters.
#[derive(Clone)]
pub struct FilterServices {
    pub metadata: Arc<dyn MetadataProvider>,
    pub settings: Arc<dyn ConfigurationProvider>,
    pub pointcuts: Arc<dyn PointcutRegistry>,
    pub custom_filters: Arc<dyn CustomFilterResolver>,
}

impl FilterServices {
    /// Bundles a metadata provider with empty defaults for the other
    /// collaborators.
    #[must_use]
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        FilterServices {
            metadata,
            settings: Arc::new(StaticSettings::new()),
            pointcuts: Arc::new(StaticPointcutRegistry::new()),
            custom_filters: Arc::new(StaticCustomFilters::new()),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn ConfigurationProvider>) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_pointcuts(mut self, pointcuts: Arc<dyn PointcutRegistry>) -> Self {
        self.pointcuts = pointcuts;
        self
    }

    #[must_use]
    pub fn with_custom_filters(mut self, custom_filters: Arc<dyn CustomFilterResolver>) -> Self {
        self.custom_filters = custom_filters;
        self
    }
}

// ---- in-memory implementations ----

#[derive(Debug, Clone, Default)]
struct MethodMetadata {
    visibility: Option<MethodVisibility>,
    annotations: BTreeMap<String, Vec<Annotation>>,
    parameters: BTreeMap<String, ParameterInfo>,
}

#[derive(Debug, Clone, Default)]
struct TypeMetadata {
    is_interface: bool,
    parent: Option<String>,
    interfaces: Vec<String>,
    annotations: BTreeMap<String, Vec<Annotation>>,
    methods: BTreeMap<String, MethodMetadata>,
}

/// A [`MetadataProvider`] assembled through a builder, holding everything
/// in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    types: BTreeMap<String, TypeMetadata>,
}

impl StaticMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a class.
    #[must_use]
    pub fn class(mut self, name: impl Into<String>) -> Self {
        self.types.entry(name.into()).or_default();
        self
    }

    /// Declares an interface.
    #[must_use]
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.types.entry(name.into()).or_default().is_interface = true;
        self
    }

    #[must_use]
    pub fn extending(mut self, class: &str, parent: impl Into<String>) -> Self {
        self.types.entry(class.to_owned()).or_default().parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn implementing(mut self, class: &str, interface: impl Into<String>) -> Self {
        self.types
            .entry(class.to_owned())
            .or_default()
            .interfaces
            .push(interface.into());
        self
    }

    #[must_use]
    pub fn class_annotation(
        mut self,
        class: &str,
        annotation_type: impl Into<String>,
        annotation: Annotation,
    ) -> Self {
        self.types
            .entry(class.to_owned())
            .or_default()
            .annotations
            .entry(annotation_type.into())
            .or_default()
            .push(annotation);
        self
    }

    #[must_use]
    pub fn method(
        mut self,
        class: &str,
        method: impl Into<String>,
        visibility: MethodVisibility,
    ) -> Self {
        self.types
            .entry(class.to_owned())
            .or_default()
            .methods
            .entry(method.into())
            .or_default()
            .visibility = Some(visibility);
        self
    }

    #[must_use]
    pub fn method_annotation(
        mut self,
        class: &str,
        method: &str,
        annotation_type: impl Into<String>,
        annotation: Annotation,
    ) -> Self {
        self.types
            .entry(class.to_owned())
            .or_default()
            .methods
            .entry(method.to_owned())
            .or_default()
            .annotations
            .entry(annotation_type.into())
            .or_default()
            .push(annotation);
        self
    }

    #[must_use]
    pub fn method_parameter(mut self, class: &str, method: &str, name: impl Into<String>) -> Self {
        let parameters = &mut self
            .types
            .entry(class.to_owned())
            .or_default()
            .methods
            .entry(method.to_owned())
            .or_default()
            .parameters;
        let position = parameters.len();
        parameters.insert(
            name.into(),
            ParameterInfo {
                position,
                type_name: None,
            },
        );
        self
    }

    fn type_meta(&self, name: &str) -> Result<&TypeMetadata, MetadataUnavailable> {
        self.types
            .get(name)
            .ok_or_else(|| MetadataUnavailable::new(format!("type {name}")))
    }

    fn method_meta(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<&MethodMetadata, MetadataUnavailable> {
        self.type_meta(class_name)?
            .methods
            .get(method_name)
            .ok_or_else(|| {
                MetadataUnavailable::new(format!("method {class_name}::{method_name}"))
            })
    }

    fn implements(&self, class_name: &str, interface_name: &str) -> bool {
        let mut current = Some(class_name);
        while let Some(name) = current {
            match self.types.get(name) {
                Some(meta) => {
                    if meta.interfaces.iter().any(|i| i == interface_name) {
                        return true;
                    }
                    current = meta.parent.as_deref();
                }
                None => break,
            }
        }
        false
    }

    fn extends(&self, class_name: &str, parent_name: &str) -> bool {
        let mut current = self
            .types
            .get(class_name)
            .and_then(|meta| meta.parent.as_deref());
        while let Some(name) = current {
            if name == parent_name {
                return true;
            }
            current = self.types.get(name).and_then(|meta| meta.parent.as_deref());
        }
        false
    }
}

impl MetadataProvider for StaticMetadata {
    fn class_annotations(
        &self,
        class_name: &str,
        annotation_type: &str,
    ) -> Result<Vec<Annotation>, MetadataUnavailable> {
        Ok(self
            .type_meta(class_name)?
            .annotations
            .get(annotation_type)
            .cloned()
            .unwrap_or_default())
    }

    fn class_names_by_annotation(&self, annotation_type: &str) -> Vec<String> {
        self.types
            .iter()
            .filter(|(_, meta)| meta.annotations.contains_key(annotation_type))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn is_interface(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|meta| meta.is_interface)
    }

    fn is_class(&self, type_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|meta| !meta.is_interface)
    }

    fn implementation_class_names(&self, interface_name: &str) -> Vec<String> {
        self.types
            .iter()
            .filter(|(name, meta)| !meta.is_interface && self.implements(name, interface_name))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn sub_class_names(&self, class_name: &str) -> Vec<String> {
        self.types
            .keys()
            .filter(|name| self.extends(name, class_name))
            .cloned()
            .collect()
    }

    fn method_annotations(
        &self,
        class_name: &str,
        method_name: &str,
        annotation_type: &str,
    ) -> Result<Vec<Annotation>, MetadataUnavailable> {
        Ok(self
            .method_meta(class_name, method_name)?
            .annotations
            .get(annotation_type)
            .cloned()
            .unwrap_or_default())
    }

    fn classes_containing_methods_annotated_with(&self, annotation_type: &str) -> Vec<String> {
        self.types
            .iter()
            .filter(|(_, meta)| {
                meta.methods
                    .values()
                    .any(|method| method.annotations.contains_key(annotation_type))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn is_method_public(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<bool, MetadataUnavailable> {
        Ok(self.method_meta(class_name, method_name)?.visibility
            == Some(MethodVisibility::Public))
    }

    fn is_method_protected(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<bool, MetadataUnavailable> {
        Ok(self.method_meta(class_name, method_name)?.visibility
            == Some(MethodVisibility::Protected))
    }

    fn method_parameters(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> Result<BTreeMap<String, ParameterInfo>, MetadataUnavailable> {
        Ok(self.method_meta(class_name, method_name)?.parameters.clone())
    }
}

/// A [`ConfigurationProvider`] over a flat path → value map.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    settings: BTreeMap<String, Value>,
}

impl StaticSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<String>, value: Value) -> Self {
        self.settings.insert(path.into(), value);
        self
    }
}

impl ConfigurationProvider for StaticSettings {
    fn setting(&self, path: &str) -> Option<Value> {
        self.settings.get(path).cloned()
    }
}

/// A [`PointcutRegistry`] over a pre-registered map keyed by
/// `"AspectClass->pointcutMethod"`.
#[derive(Clone, Default)]
pub struct StaticPointcutRegistry {
    pointcuts: BTreeMap<String, Arc<dyn PointcutFilter>>,
}

impl StaticPointcutRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(
        mut self,
        aspect_class_name: &str,
        pointcut_method_name: &str,
        filter: Arc<dyn PointcutFilter>,
    ) -> Self {
        self.pointcuts
            .insert(format!("{aspect_class_name}->{pointcut_method_name}"), filter);
        self
    }
}

impl PointcutRegistry for StaticPointcutRegistry {
    fn find_pointcut(
        &self,
        aspect_class_name: &str,
        pointcut_method_name: &str,
    ) -> Option<Arc<dyn PointcutFilter>> {
        self.pointcuts
            .get(&format!("{aspect_class_name}->{pointcut_method_name}"))
            .cloned()
    }
}

/// A [`CustomFilterResolver`] over a pre-registered name → filter map.
#[derive(Clone, Default)]
pub struct StaticCustomFilters {
    filters: BTreeMap<String, Arc<dyn PointcutFilter>>,
}

impl StaticCustomFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, filter: Arc<dyn PointcutFilter>) -> Self {
        self.filters.insert(name.into(), filter);
        self
    }
}

impl CustomFilterResolver for StaticCustomFilters {
    fn custom_filter(&self, name: &str) -> Option<Arc<dyn PointcutFilter>> {
        self.filters.get(name).cloned()
    }
}
