//! The interface registry: declared contracts plus the set of asserted conformances.
use crate::analysis::topology::ObligationGraph;
use crate::config::ConformanceConfig;
use crate::contract::{Contract, ContractCompiler};
use crate::query::Host;
use crate::store::{InterfaceId, Scope, TypeExpr};
use crate::validation::{ConformanceError, ValidationContext, Validator};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Thread-safe store of compiled contracts.
///
/// Contracts are immutable once declared and handed out as `Arc<Contract>`, so
/// checks never hold a lock while they query the host.
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    config: ConformanceConfig,
    contracts: RwLock<HashMap<InterfaceId, Arc<Contract>>>,
    facts: RwLock<HashSet<(TypeExpr, InterfaceId)>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ConformanceConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &ConformanceConfig {
        &self.config
    }

    /// Declares an interface owned by the configured default scope.
    ///
    /// `alias` names the placeholder for the candidate inside `block`; without one the
    /// configured default is used.
    pub fn define_interface(
        &self,
        identity: &str,
        alias: Option<&str>,
        block: &str,
    ) -> Result<Arc<Contract>, ConformanceError> {
        let scope = Scope::new(self.config.default_scope.as_str());
        self.define_interface_in(scope, identity, alias, block)
    }

    pub fn define_interface_in(
        &self,
        scope: Scope,
        identity: &str,
        alias: Option<&str>,
        block: &str,
    ) -> Result<Arc<Contract>, ConformanceError> {
        let placeholder = alias.unwrap_or(&self.config.default_placeholder);

        // Held across compilation so two racing declarations cannot both succeed.
        let mut contracts = self.write_contracts();
        if contracts.contains_key(identity) {
            return Err(ConformanceError::DuplicateInterface {
                interface: InterfaceId::new(identity),
            });
        }

        let known = |name: &str| contracts.contains_key(name);
        let contract = ContractCompiler::new(identity, placeholder, scope)
            .with_known_interfaces(&known)
            .compile(block)?;
        let contract = Arc::new(contract);

        contracts.insert(contract.identity.clone(), Arc::clone(&contract));
        let cycles = ObligationGraph::build(contracts.values().map(Arc::as_ref)).cycles();
        drop(contracts);

        info!(
            interface = identity,
            scope = %contract.home_scope,
            requirements = contract.requirements.len(),
            "declared interface"
        );
        for cycle in cycles.iter().filter(|c| c.contains(&contract.identity)) {
            let members: Vec<&str> = cycle.iter().map(InterfaceId::as_str).collect();
            warn!(interface = identity, cycle = ?members, "interface obligations form a cycle");
        }
        Ok(contract)
    }

    pub fn contract(&self, identity: &str) -> Option<Arc<Contract>> {
        self.read_contracts().get(identity).cloned()
    }

    /// Declared interface names, sorted.
    pub fn interfaces(&self) -> Vec<InterfaceId> {
        let mut ids: Vec<InterfaceId> = self.read_contracts().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_interface_type(&self, identity: &str) -> bool {
        self.read_contracts().contains_key(identity)
    }

    /// Runs a conformance check and returns the first violation.
    ///
    /// `scopes` defaults to the interface's home scope.
    pub fn check<H: Host + ?Sized>(
        &self,
        host: &H,
        candidate: &TypeExpr,
        interface: &str,
        scopes: Option<&[Scope]>,
    ) -> Result<(), ConformanceError> {
        let contract = self.contract(interface).ok_or_else(|| ConformanceError::UnknownInterface {
            interface: InterfaceId::new(interface),
        })?;
        let scopes = match scopes {
            Some(scopes) => scopes.to_vec(),
            None => vec![contract.home_scope.clone()],
        };
        let ctx = ValidationContext::new(candidate.clone(), contract.identity.clone(), scopes);
        Validator::new(&contract, self, host).validate(&ctx)
    }

    /// Does `candidate` conform to `interface`? Never fails: every violation, including
    /// an undeclared interface, is reported as `false`.
    pub fn implements<H: Host + ?Sized>(
        &self,
        host: &H,
        candidate: &TypeExpr,
        interface: &str,
        scopes: Option<&[Scope]>,
    ) -> bool {
        match self.check(host, candidate, interface, scopes) {
            Ok(()) => {
                debug!(%candidate, interface, "conforms");
                true
            }
            Err(err) => {
                debug!(%candidate, interface, error = %err, "does not conform");
                false
            }
        }
    }

    /// Checks `candidate` against `interface` and records the conformance on success.
    pub fn assert_implements<H: Host + ?Sized>(
        &self,
        host: &H,
        candidate: &TypeExpr,
        interface: &str,
    ) -> Result<(), ConformanceError> {
        if let Err(err) = self.check(host, candidate, interface, None) {
            warn!(%candidate, interface, error = %err, "conformance assertion failed");
            return Err(err);
        }
        let fact = (candidate.clone(), InterfaceId::new(interface));
        if self.write_facts().insert(fact) {
            info!(%candidate, interface, "recorded conformance");
        }
        Ok(())
    }

    /// Was `candidate` previously asserted to implement `interface`? Does not re-check.
    pub fn is_registered(&self, candidate: &TypeExpr, interface: &str) -> bool {
        let fact = (candidate.clone(), InterfaceId::new(interface));
        self.read_facts().contains(&fact)
    }

    /// Types asserted to implement `interface`, sorted by display name.
    pub fn registered_implementations(&self, interface: &str) -> Vec<TypeExpr> {
        let mut types: Vec<TypeExpr> = self
            .read_facts()
            .iter()
            .filter(|(_, id)| id.as_str() == interface)
            .map(|(ty, _)| ty.clone())
            .collect();
        types.sort_by_cached_key(ToString::to_string);
        types
    }

    /// Answers `implements` for many candidates at once, in parallel.
    pub fn conformance_matrix<H: Host + Sync + ?Sized>(
        &self,
        host: &H,
        candidates: &[TypeExpr],
        interface: &str,
    ) -> Vec<bool> {
        candidates
            .par_iter()
            .map(|candidate| self.implements(host, candidate, interface, None))
            .collect()
    }

    /// Groups of interfaces whose return or `implements` obligations reach each other.
    pub fn obligation_cycles(&self) -> Vec<Vec<InterfaceId>> {
        let contracts = self.read_contracts();
        ObligationGraph::build(contracts.values().map(Arc::as_ref)).cycles()
    }

    fn read_contracts(&self) -> RwLockReadGuard<'_, HashMap<InterfaceId, Arc<Contract>>> {
        self.contracts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_contracts(&self) -> RwLockWriteGuard<'_, HashMap<InterfaceId, Arc<Contract>>> {
        self.contracts.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_facts(&self) -> RwLockReadGuard<'_, HashSet<(TypeExpr, InterfaceId)>> {
        self.facts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_facts(&self) -> RwLockWriteGuard<'_, HashSet<(TypeExpr, InterfaceId)>> {
        self.facts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CyclePolicy;
    use crate::store::Environment;
    use crate::validation::ErrorKind;
    use rstest::{fixture, rstest};

    fn t(name: &str) -> TypeExpr {
        TypeExpr::named(name)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Number > {Int, Float}, AbstractString > String, plus a few standalone types.
    #[fixture]
    fn env() -> Environment {
        init_tracing();
        let mut env = Environment::new();
        let types = [
            ("Number", None),
            ("Int", Some("Number")),
            ("Float", Some("Number")),
            ("AbstractString", None),
            ("String", Some("AbstractString")),
            ("Vector", None),
            ("Point", None),
            ("Range", None),
            ("Node", None),
            ("Bool", None),
        ];
        for (name, parent) in types {
            env.declare_type(name, parent).unwrap();
        }
        let main = Scope::new("Main");
        env.define_method(&main, "length", vec![t("Vector")], t("Int"));
        env.define_method(&main, "length", vec![t("String")], t("Int"));
        env.define_method(&main, "getindex", vec![t("Vector"), t("Int")], TypeExpr::Any);
        env.define_method(&main, "add", vec![t("Number"), t("Number")], t("Number"));
        env.define_method(&main, "norm", vec![t("Point")], t("Float"));
        env.define_method(&main, "first", vec![t("Range")], t("Int"));
        env.define_method(&main, "last", vec![t("Range")], t("Int"));
        env
    }

    #[rstest]
    fn test_sized_interface(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();

        assert!(registry.implements(&env, &t("Vector"), "Sized", None));
        assert!(registry.implements(&env, &t("String"), "Sized", None));
        assert!(!registry.implements(&env, &t("Int"), "Sized", None));

        let err = registry.assert_implements(&env, &t("Int"), "Sized").unwrap_err();
        assert_eq!(
            err,
            ConformanceError::MissingOperation {
                interface: InterfaceId::new("Sized"),
                operation: "length".into(),
                arg_types: vec![t("Int")],
                scopes: vec![Scope::new("Main")],
            }
        );
    }

    #[rstest]
    fn test_multi_parameter_requirement(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry
            .define_interface("Indexable", None, "getindex(c::Self, i::Int)")
            .unwrap();
        assert!(registry.implements(&env, &t("Vector"), "Indexable", None));
        assert!(!registry.implements(&env, &t("String"), "Indexable", None));
    }

    #[rstest]
    fn test_alias_and_return_annotations(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry
            .define_interface("Addable", Some("T"), "add(a::T, b::T) :: Number")
            .unwrap();
        assert!(registry.implements(&env, &t("Int"), "Addable", None));
        assert!(registry.implements(&env, &t("Float"), "Addable", None));

        registry.define_interface("Counted", None, "length(x::Self) :: Bool").unwrap();
        let err = registry.check(&env, &t("Vector"), "Counted", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReturnType);
        assert_eq!(
            err.to_string(),
            "'Counted' requires `length(Vector)` to return Bool, but it returns Int"
        );
    }

    #[rstest]
    fn test_any_return_is_not_narrowed(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry
            .define_interface("IntIndexed", None, "getindex(c::Self, i::Int) :: Int")
            .unwrap();
        assert!(!registry.implements(&env, &t("Vector"), "IntIndexed", None));
    }

    #[rstest]
    fn test_nested_interface_obligation(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();
        registry.define_interface("Measured", None, "norm(x::Self) :: Sized").unwrap();

        let err = registry.check(&env, &t("Point"), "Measured", None).unwrap_err();
        let ConformanceError::InvalidReturnType { inferred, source, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(inferred.as_ref(), Some(&t("Float")));
        let cause = source.as_deref().unwrap();
        assert_eq!(cause.kind(), ErrorKind::MissingOperation);

        registry.define_interface("Arith", None, "add(a::Self, b::Self)").unwrap();
        registry.define_interface("ArithNorm", None, "norm(x::Self) :: Arith").unwrap();
        assert!(registry.implements(&env, &t("Point"), "ArithNorm", None));
    }

    #[rstest]
    fn test_interface_declared_after_dependent_is_promoted(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("ArithNorm", None, "norm(x::Self) :: Arith").unwrap();
        // `Arith` is not declared yet: the annotation is an ordinary type.
        assert!(!registry.implements(&env, &t("Point"), "ArithNorm", None));

        registry.define_interface("Arith", None, "add(a::Self, b::Self)").unwrap();
        assert!(registry.implements(&env, &t("Point"), "ArithNorm", None));
    }

    #[rstest]
    fn test_nominal_requirement(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry
            .define_interface("Number", None, "<: self\nadd(a::Self, b::Self)")
            .unwrap();
        assert!(registry.implements(&env, &t("Int"), "Number", None));

        let err = registry.check(&env, &t("Point"), "Number", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubtypingRequired);
    }

    #[rstest]
    fn test_alternatives(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry
            .define_interface("Bounded", None, "length(x::Self) ||\n  first(x::Self)")
            .unwrap();
        assert!(registry.implements(&env, &t("Vector"), "Bounded", None));
        assert!(registry.implements(&env, &t("Range"), "Bounded", None));

        let err = registry.check(&env, &t("Point"), "Bounded", None).unwrap_err();
        assert_eq!(
            err,
            ConformanceError::AlternativeUnsatisfied {
                interface: InterfaceId::new("Bounded"),
                candidate: t("Point"),
                group: "length(x::Self) ||\n  first(x::Self)".into(),
            }
        );
    }

    #[rstest]
    fn test_subtyping_inside_alternative_is_fatal(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry
            .define_interface("Strange", None, "length(x::Self) || <: self")
            .unwrap();
        let err = registry.check(&env, &t("Vector"), "Strange", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubtypingRequired);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_short_circuit_alternatives(env: Environment, #[case] short_circuit: bool) {
        let config = ConformanceConfig {
            short_circuit_alternatives: short_circuit,
            ..Default::default()
        };
        let registry = InterfaceRegistry::with_config(config);
        registry
            .define_interface("Strange", None, "length(x::Self) || <: self")
            .unwrap();
        assert_eq!(registry.implements(&env, &t("Vector"), "Strange", None), short_circuit);
    }

    #[rstest]
    fn test_conditional_requirements(env: Environment) {
        let registry = InterfaceRegistry::new();
        let block = "\
if Self <: Number
    add(a::Self, b::Self)
elseif Self == Range
    first(x::Self)
    last(x::Self)
else
    length(x::Self)
end";
        registry.define_interface("Collectionish", None, block).unwrap();
        assert!(registry.implements(&env, &t("Int"), "Collectionish", None));
        assert!(registry.implements(&env, &t("Range"), "Collectionish", None));
        assert!(registry.implements(&env, &t("Vector"), "Collectionish", None));
        assert!(!registry.implements(&env, &t("Point"), "Collectionish", None));
    }

    #[rstest]
    fn test_implements_predicate(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();
        let block = "if implements(Self, Sized)\n getindex(c::Self, i::Int)\nend";
        registry.define_interface("IndexedIfSized", None, block).unwrap();
        assert!(registry.implements(&env, &t("Vector"), "IndexedIfSized", None));
        assert!(!registry.implements(&env, &t("String"), "IndexedIfSized", None));
        assert!(registry.implements(&env, &t("Point"), "IndexedIfSized", None));
    }

    #[rstest]
    fn test_cyclic_obligations(env: Environment) {
        let mut env = env;
        let main = Scope::new("Main");
        env.define_method(&main, "next", vec![t("Node")], t("Node"));

        let registry = InterfaceRegistry::new();
        registry.define_interface("Linked", None, "next(x::Self) :: Linked").unwrap();
        assert_eq!(registry.obligation_cycles(), vec![vec![InterfaceId::new("Linked")]]);

        let err = registry.check(&env, &t("Node"), "Linked", None).unwrap_err();
        assert_eq!(
            err,
            ConformanceError::CyclicObligation {
                chain: vec![
                    (t("Node"), InterfaceId::new("Linked")),
                    (t("Node"), InterfaceId::new("Linked")),
                ],
            }
        );

        let config = ConformanceConfig { cycle_policy: CyclePolicy::Assume, ..Default::default() };
        let assuming = InterfaceRegistry::with_config(config);
        assuming.define_interface("Linked", None, "next(x::Self) :: Linked").unwrap();
        assert!(assuming.implements(&env, &t("Node"), "Linked", None));
    }

    #[rstest]
    #[case(CyclePolicy::Reject, false)]
    #[case(CyclePolicy::Assume, true)]
    fn test_mutually_recursive_obligations(
        env: Environment,
        #[case] policy: CyclePolicy,
        #[case] expected: bool,
    ) {
        let mut env = env;
        let main = Scope::new("Main");
        env.define_method(&main, "next", vec![t("Node")], t("Node"));
        env.define_method(&main, "prev", vec![t("Node")], t("Node"));

        let config = ConformanceConfig { cycle_policy: policy, ..Default::default() };
        let registry = InterfaceRegistry::with_config(config);
        registry.define_interface("Forward", None, "next(x::Self) :: Backward").unwrap();
        registry.define_interface("Backward", None, "prev(x::Self) :: Forward").unwrap();
        assert_eq!(
            registry.obligation_cycles(),
            vec![vec![InterfaceId::new("Backward"), InterfaceId::new("Forward")]]
        );

        let result = registry.check(&env, &t("Node"), "Forward", None);
        assert_eq!(result.is_ok(), expected);
        if let Err(err) = result {
            assert_eq!(
                err,
                ConformanceError::CyclicObligation {
                    chain: vec![
                        (t("Node"), InterfaceId::new("Forward")),
                        (t("Node"), InterfaceId::new("Backward")),
                        (t("Node"), InterfaceId::new("Forward")),
                    ],
                }
            );
        }
    }

    #[rstest]
    fn test_scopes(env: Environment) {
        let mut env = env;
        let geometry = Scope::new("Geometry");
        env.define_method(&geometry, "area", vec![t("Point")], t("Float"));

        let registry = InterfaceRegistry::new();
        registry.define_interface("Shape", None, "area(x::Self)").unwrap();
        registry
            .define_interface_in(geometry.clone(), "Surface", None, "area(x::Self)")
            .unwrap();

        assert!(!registry.implements(&env, &t("Point"), "Shape", None));
        assert!(registry.implements(&env, &t("Point"), "Shape", Some(&[geometry])));
        assert!(registry.implements(&env, &t("Point"), "Surface", None));
    }

    #[rstest]
    fn test_declaration_errors(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();

        let dup = registry.define_interface("Sized", None, "length(x::Self)").unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::DuplicateInterface);

        let bad = registry.define_interface("Broken", None, "length(x::Self").unwrap_err();
        assert_eq!(bad.kind(), ErrorKind::MalformedContract);
        assert!(!registry.is_interface_type("Broken"));

        let empty = registry.define_interface("Empty", None, "op()").unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::MalformedContract);
        assert!(!registry.is_interface_type("Empty"));

        assert!(!registry.implements(&env, &t("Vector"), "Missing", None));
        let unknown = registry.assert_implements(&env, &t("Vector"), "Missing").unwrap_err();
        assert_eq!(
            unknown,
            ConformanceError::UnknownInterface { interface: InterfaceId::new("Missing") }
        );

        assert_eq!(registry.interfaces(), vec![InterfaceId::new("Sized")]);
    }

    #[rstest]
    fn test_assertions_are_recorded(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();

        registry.assert_implements(&env, &t("Vector"), "Sized").unwrap();
        registry.assert_implements(&env, &t("String"), "Sized").unwrap();
        registry.assert_implements(&env, &t("Vector"), "Sized").unwrap();
        assert!(registry.assert_implements(&env, &t("Int"), "Sized").is_err());

        assert!(registry.is_registered(&t("Vector"), "Sized"));
        assert!(!registry.is_registered(&t("Int"), "Sized"));
        assert_eq!(registry.registered_implementations("Sized"), vec![t("String"), t("Vector")]);
    }

    #[rstest]
    fn test_checks_are_repeatable(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self) :: Int").unwrap();
        let first = registry.check(&env, &t("Point"), "Sized", None);
        let second = registry.check(&env, &t("Point"), "Sized", None);
        assert_eq!(first, second);
        assert!(first.is_err());

        let mut env = env;
        env.define_method(&Scope::new("Main"), "length", vec![t("Point")], t("Int"));
        assert!(registry.implements(&env, &t("Point"), "Sized", None));
    }

    #[rstest]
    fn test_conformance_matrix(env: Environment) {
        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();
        let candidates = [t("Vector"), t("Int"), t("String"), t("Point")];
        let matrix = registry.conformance_matrix(&env, &candidates, "Sized");
        assert_eq!(matrix, vec![true, false, true, false]);
    }

    #[rstest]
    fn test_parametric_candidate(env: Environment) {
        let mut env = env;
        let main = Scope::new("Main");
        env.declare_type("Array", None).unwrap();
        let int_array = TypeExpr::applied("Array", vec![t("Int")]);
        env.define_method(&main, "length", vec![int_array.clone()], t("Int"));

        let registry = InterfaceRegistry::new();
        registry.define_interface("Sized", None, "length(x::Self)").unwrap();
        assert!(registry.implements(&env, &int_array, "Sized", None));
        let float_array = TypeExpr::applied("Array", vec![t("Float")]);
        assert!(!registry.implements(&env, &float_array, "Sized", None));
    }
}
