use super::context::{CodeWriter, EmissionContext, Mode, Role};
use super::documentation::{Documented, Place};
use super::helper::CodeGenHelper;
use super::prebuilt::PrebuiltRegistry;
use super::{identifier, string_literal, CodeGen};
use crate::ast::{
    Definition, DefinitionProvider, Direction, Document, FunctionVariant, Interface, Module,
    ObjectHandle, Property, Structure, TopLevel, Type, TypeDefinition,
};
use crate::error::CodegenError;
use std::collections::BTreeSet;

/// `A::B::` for a scope, empty for the root.
pub fn scope_prefix(scope: &[String]) -> String {
    scope.iter().map(|s| format!("{s}::")).collect()
}

/// Fully qualified class name of an interface or object, e.g. `Calc::Account`.
pub fn class_path(provider: DefinitionProvider<'_>) -> String {
    format!("{}{}", scope_prefix(provider.scope()), provider.name())
}

/// Walk state for one C++ generation call.
///
/// Marshalling backends receive it in every hook: it owns the output
/// buffer and knows how to spell types in the current interface.
pub struct CppEmitter<'a> {
    document: &'a Document,
    ctx: EmissionContext,
    helper: &'a dyn CodeGenHelper,
    pub w: CodeWriter,
    interface: Option<&'a Interface>,
    prebuilt: PrebuiltRegistry,
    emitted: BTreeSet<usize>,
}

impl<'a> CppEmitter<'a> {
    fn new(document: &'a Document, ctx: EmissionContext, helper: &'a dyn CodeGenHelper) -> Self {
        CppEmitter {
            document,
            ctx,
            helper,
            w: CodeWriter::new(helper.tab().unit()),
            interface: None,
            prebuilt: PrebuiltRegistry::new(),
            emitted: BTreeSet::new(),
        }
    }

    pub fn ctx(&self) -> EmissionContext {
        self.ctx
    }

    pub fn mode(&self) -> Mode {
        self.ctx.mode
    }

    pub fn role(&self) -> Role {
        self.ctx.role
    }

    /// True when class bodies are written, i.e. not in out-of-line mode.
    pub fn is_declaring(&self) -> bool {
        self.ctx.mode != Mode::Implementation
    }

    pub fn helper(&self) -> &'a dyn CodeGenHelper {
        self.helper
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn prebuilt(&self) -> &PrebuiltRegistry {
        &self.prebuilt
    }

    /// Name of the interface currently being walked.
    pub fn interface_name(&self) -> &'a str {
        self.interface.map(|i| i.name.as_str()).unwrap_or_default()
    }

    pub fn document_item(&mut self, level: usize, item: Documented<'_>, place: Place) {
        let helper = self.helper;
        helper.documentation().write(&mut self.w, level, item, place);
    }

    fn enter_interface(&mut self, interface: &'a Interface) {
        self.interface = Some(interface);
        self.prebuilt = PrebuiltRegistry::from_definitions(self.document, &interface.definitions);
        self.emitted.clear();
    }

    fn leave_interface(&mut self) {
        self.interface = None;
        self.prebuilt = PrebuiltRegistry::new();
    }

    /// A name declared in `scope`. Class bodies sit inside the interface
    /// class and name it from there; out-of-line definitions need the whole
    /// scope chain.
    pub fn scoped(&self, scope: &[String], name: &str) -> String {
        let scope = if self.is_declaring() {
            scope.get(1..).unwrap_or_default()
        } else {
            scope
        };
        format!("{}{name}", scope_prefix(scope))
    }

    /// Name of a prebuilt type, declared in its interface.
    pub fn prebuilt_name(&self, index: usize) -> String {
        let name = format!("_Prebuilt{index}");
        if self.is_declaring() {
            name
        } else {
            format!("{}::{name}", self.interface_name())
        }
    }

    /// C++ spelling of a type.
    ///
    /// # Errors
    /// Fails for an anonymous structure outside any interface.
    pub fn type_name(&self, ty: &Type) -> Result<String, CodegenError> {
        Ok(match ty {
            Type::Integer => "long long".to_string(),
            Type::Float => "double".to_string(),
            Type::Boolean => "bool".to_string(),
            Type::String => "string".to_string(),
            Type::DateTime => "datetime".to_string(),
            Type::Blob => "blob".to_string(),
            Type::Void => "void".to_string(),
            Type::Nullable(inner) => format!("nullable<{}>", self.type_name(inner)?),
            Type::Array(inner) => format!("array<{}>", self.type_name(inner)?),
            Type::Tuple(types) => {
                let names = types
                    .iter()
                    .map(|t| self.type_name(t))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("std::tuple<{}>", names.join(", "))
            }
            Type::Structure(_) => match self.prebuilt.index_of(ty) {
                Some(index) => self.prebuilt_name(index),
                None => {
                    return Err(CodegenError::UnsupportedConstruct {
                        path: self.interface_name().to_string(),
                        message: "anonymous structure outside of an interface".to_string(),
                    })
                }
            },
            Type::Definition(td) => self.scoped(&td.scope, &td.name),
            Type::Object(handle) => format!("{}::Ptr", self.scoped(&handle.scope, &handle.name)),
        })
    }
}

/// The body-level hooks a C++ marshalling backend provides.
///
/// The dispatcher owns the class layout; every hook writes at the given
/// indentation level and must respect the emitter's Mode and Role.
pub trait CppMarshalling {
    fn write_includes(&self, e: &mut CppEmitter<'_>) -> Result<(), CodegenError>;
    fn write_aliases(&self, e: &mut CppEmitter<'_>, level: usize) -> Result<(), CodegenError>;
    fn write_object_base(&self, e: &mut CppEmitter<'_>, level: usize) -> Result<(), CodegenError>;
    fn write_private_members(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
    fn write_constructor_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
    fn write_destructor_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
    fn write_function_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError>;
    fn write_property_getter_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError>;
    fn write_property_setter_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError>;
    fn write_invoke(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;

    /// Extra members at the end of the public section.
    fn write_public_extras(
        &self,
        _e: &mut CppEmitter<'_>,
        _level: usize,
        _provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        Ok(())
    }

    /// Extra members at the end of the protected section.
    fn write_protected_extras(
        &self,
        _e: &mut CppEmitter<'_>,
        _level: usize,
        _provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        Ok(())
    }
}

/// C++ dispatcher. Interfaces become classes, objects nested classes
/// deriving from `_Object`, modules namespaces.
#[derive(Debug)]
pub struct CppCodeGen<M> {
    helper: Box<dyn CodeGenHelper>,
    marshalling: M,
}

impl<M: CppMarshalling> CppCodeGen<M> {
    pub fn new(helper: Box<dyn CodeGenHelper>, marshalling: M) -> Self {
        CppCodeGen {
            helper,
            marshalling,
        }
    }

    pub fn helper(&self) -> &dyn CodeGenHelper {
        self.helper.as_ref()
    }

    fn write_top_level<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        top_level: &'a TopLevel,
    ) -> Result<(), CodegenError> {
        match top_level {
            TopLevel::Interface(interface) => self.write_interface(e, level, interface),
            TopLevel::Module(module) => self.write_module(e, level, module),
        }
    }

    fn write_module<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        module: &'a Module,
    ) -> Result<(), CodegenError> {
        let declaring = e.is_declaring();
        if declaring {
            e.document_item(level, Documented::Plain(&module.documentation), Place::Before);
        }
        e.w.line(level, format!("namespace {} {{", module.name));
        if declaring && !module.info.is_empty() {
            for (key, value) in &module.info {
                e.w.line(
                    level + 1,
                    format!(
                        "static constexpr const char * {} = {};",
                        identifier(key),
                        string_literal(value)
                    ),
                );
            }
        }
        for element in &module.elements {
            e.w.blank();
            self.write_top_level(e, level + 1, element)?;
        }
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    fn write_interface<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        interface: &'a Interface,
    ) -> Result<(), CodegenError> {
        log::trace!("C++ interface '{}' ({})", interface.name, e.ctx());
        e.enter_interface(interface);
        let provider = DefinitionProvider::Interface(interface);
        let declaring = e.is_declaring();
        let mut level = level;

        if declaring {
            e.document_item(level, Documented::Plain(&interface.documentation), Place::Before);
            e.w.line(level, format!("class {}", interface.name));
            e.w.line(level, "{");
            level += 1;
            self.write_private_section(e, level, provider)?;
            e.w.line(level - 1, "public:");
        } else {
            self.write_private_section(e, level, provider)?;
        }

        self.write_public_section(e, level, provider)?;

        if declaring {
            e.w.line(level - 1, "protected:");
        }
        self.write_protected_section(e, level, provider)?;
        self.write_trailing_private(e, level, provider)?;

        if declaring {
            level -= 1;
            e.w.line(level, "};");
            e.w.blank();
        }
        e.leave_interface();
        Ok(())
    }

    fn write_object<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        handle: &ObjectHandle,
    ) -> Result<(), CodegenError> {
        let object = e.document().object(handle);
        let provider = DefinitionProvider::Object(object);
        let declaring = e.is_declaring();
        let mut level = level;

        if declaring {
            e.document_item(level, Documented::Plain(&object.documentation), Place::Before);
            e.w.line(level, format!("class {} : public _Object", object.name));
            e.w.line(level, "{");
            level += 1;
            self.write_private_section(e, level, provider)?;
            e.w.line(level - 1, "public:");
            e.w.line(level, format!("typedef std::shared_ptr<{}> Ptr;", object.name));
        } else {
            self.write_private_section(e, level, provider)?;
        }

        self.write_public_section(e, level, provider)?;
        match e.mode() {
            Mode::AllInOne => {
                e.w.line(level, "virtual std::string _id() const override");
                e.w.line(level, "{ return __id; }");
                e.w.blank();
            }
            Mode::Declaration => e.w.line(level, "virtual std::string _id() const override;"),
            Mode::Implementation => {
                e.w.line(level, format!("std::string {}::_id() const", class_path(provider)));
                e.w.line(level, "{ return _priv->__id; }");
                e.w.blank();
            }
        }

        if declaring {
            e.w.line(level - 1, "protected:");
        }
        self.write_protected_section(e, level, provider)?;
        self.write_trailing_private(e, level, provider)?;

        if declaring {
            level -= 1;
            e.w.line(level, "};");
            e.w.blank();
        }
        Ok(())
    }

    fn write_private_section(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        match e.mode() {
            Mode::Implementation => {
                e.w.line(level, format!("struct {}::_Priv", class_path(provider)));
                e.w.line(level, "{");
                self.write_priv(e, level + 1, provider)?;
                self.marshalling.write_private_members(e, level + 1, provider)?;
                e.w.line(level, "};");
                e.w.blank();
            }
            Mode::Declaration => {
                e.w.line(level, "struct _Priv;");
                e.w.line(level, "_Priv * _priv;");
            }
            Mode::AllInOne => {
                e.w.line(level, format!("{} * _that = this;", provider.name()));
                if provider.is_object() {
                    e.w.line(level, format!("{} * _intf;", e.interface_name()));
                    e.w.line(level, "std::string __id;");
                }
                e.w.blank();
            }
        }
        Ok(())
    }

    /// In-class private members go last so they can name the aliases and
    /// nested types declared above them.
    fn write_trailing_private(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if e.mode() == Mode::AllInOne {
            e.w.line(level - 1, "private:");
            self.marshalling.write_private_members(e, level, provider)?;
        }
        Ok(())
    }

    /// Constructor, destructor and back references of the out-of-line `_Priv`.
    fn write_priv(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        let name = provider.name();
        let interface = e.interface_name();
        if provider.is_object() {
            e.w.line(
                level,
                format!(
                    "_Priv({name} * _that_, {interface} * _intf_, const std::string & _id_): _that(_that_), _intf(_intf_), __id(_id_)"
                ),
            );
        } else {
            e.w.line(level, format!("_Priv({name} * _that_): _that(_that_)"));
        }
        e.w.line(level, "{");
        self.marshalling.write_constructor_body(e, level + 1, provider)?;
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(level, "~_Priv()");
        e.w.line(level, "{");
        self.marshalling.write_destructor_body(e, level + 1, provider)?;
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(level, format!("{name} * _that;"));
        if provider.is_object() {
            e.w.line(level, format!("{interface} * _intf;"));
            e.w.line(level, "std::string __id;");
        }
        e.w.blank();
        Ok(())
    }

    fn write_public_section<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        provider: DefinitionProvider<'a>,
    ) -> Result<(), CodegenError> {
        if e.is_declaring() && !provider.is_object() {
            self.marshalling.write_aliases(e, level)?;
        }
        match e.role() {
            Role::Client => {
                self.write_constructor(e, level, provider)?;
                self.write_destructor(e, level, provider)?;
                self.write_definitions(e, level, provider)?;
            }
            Role::Server => {
                self.marshalling.write_invoke(e, level, provider)?;
                self.write_destructor(e, level, provider)?;
            }
        }
        self.marshalling.write_public_extras(e, level, provider)
    }

    fn write_protected_section<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        provider: DefinitionProvider<'a>,
    ) -> Result<(), CodegenError> {
        match e.role() {
            Role::Client => self.marshalling.write_invoke(e, level, provider)?,
            Role::Server => {
                self.write_constructor(e, level, provider)?;
                self.write_definitions(e, level, provider)?;
            }
        }
        self.marshalling.write_protected_extras(e, level, provider)
    }

    fn write_constructor(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        let name = provider.name();
        let parameters = if provider.is_object() {
            format!("{} * intf, const std::string & id", e.interface_name())
        } else {
            String::new()
        };
        match e.mode() {
            Mode::AllInOne => {
                if provider.is_object() {
                    e.w.line(level, format!("{name}({parameters}) : _intf(intf), __id(id)"));
                } else {
                    e.w.line(level, format!("{name}()"));
                }
                e.w.line(level, "{");
                self.marshalling.write_constructor_body(e, level + 1, provider)?;
                e.w.line(level, "}");
                e.w.blank();
            }
            Mode::Declaration => e.w.line(level, format!("{name}({parameters});")),
            Mode::Implementation => {
                let init = if provider.is_object() {
                    "_priv(new _Priv(this, intf, id))"
                } else {
                    "_priv(new _Priv(this))"
                };
                e.w.line(
                    level,
                    format!("{}::{name}({parameters}) : {init}", class_path(provider)),
                );
                e.w.line(level, "{ }");
                e.w.blank();
            }
        }
        Ok(())
    }

    fn write_destructor(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        let name = provider.name();
        match e.mode() {
            Mode::AllInOne => {
                e.w.line(level, format!("virtual ~{name}()"));
                e.w.line(level, "{");
                self.marshalling.write_destructor_body(e, level + 1, provider)?;
                e.w.line(level, "}");
                e.w.blank();
            }
            Mode::Declaration => e.w.line(level, format!("virtual ~{name}();")),
            Mode::Implementation => {
                e.w.line(level, format!("{}::~{name}()", class_path(provider)));
                e.w.line(level, "{ delete _priv; }");
                e.w.blank();
            }
        }
        Ok(())
    }

    fn write_definitions<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        provider: DefinitionProvider<'a>,
    ) -> Result<(), CodegenError> {
        let at_interface = !provider.is_object();
        if at_interface && e.is_declaring() {
            self.marshalling.write_object_base(e, level)?;
        }
        for definition in provider.definitions() {
            if at_interface && e.is_declaring() {
                self.write_prebuilt_structures(e, level, definition)?;
            }
            match definition {
                Definition::TypeDefinition(td) => self.write_type_definition(e, level, td)?,
                Definition::Function(variant) | Definition::Method(variant) => {
                    self.write_function(e, level, provider, variant)?;
                }
                Definition::Property(property) => self.write_property(e, level, property)?,
                Definition::Object(handle) => self.write_object(e, level, handle)?,
            }
        }
        Ok(())
    }

    /// Declares the anonymous structures a definition needs, once each.
    fn write_prebuilt_structures(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        definition: &Definition,
    ) -> Result<(), CodegenError> {
        for index in e.prebuilt.indices_for(e.document, definition) {
            if !e.emitted.insert(index) {
                continue;
            }
            let Some(ty) = e.prebuilt.get(index).map(|p| p.ty.clone()) else {
                continue;
            };
            if let Type::Structure(structure) = &*ty {
                e.w.line(level, format!("struct _Prebuilt{index}"));
                e.w.line(level, "{");
                self.write_members(e, level + 1, structure)?;
                e.w.line(level, "};");
                e.w.blank();
            }
        }
        Ok(())
    }

    fn write_members(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        structure: &Structure,
    ) -> Result<(), CodegenError> {
        for member in &structure.members {
            e.document_item(level, Documented::Plain(&member.documentation), Place::Before);
            let ty = e.type_name(&member.ty)?;
            e.w.line(level, format!("{ty} {};", member.name));
        }
        Ok(())
    }

    fn write_type_definition(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        td: &TypeDefinition,
    ) -> Result<(), CodegenError> {
        if !e.is_declaring() {
            return Ok(());
        }
        e.document_item(level, Documented::Plain(&td.documentation), Place::Before);
        match &*td.ty {
            Type::Structure(structure) => {
                e.w.line(level, format!("struct {}", td.name));
                e.w.line(level, "{");
                self.write_members(e, level + 1, structure)?;
                e.w.line(level, "};");
            }
            ty => {
                let ty = e.type_name(ty)?;
                e.w.line(level, format!("typedef {ty} {};", td.name));
            }
        }
        Ok(())
    }

    /// Ends a signature: `;`, `= 0;` or an inline body, depending on Mode/Role.
    fn finish_member<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        body: impl FnOnce(&mut CppEmitter<'a>, usize) -> Result<(), CodegenError>,
    ) -> Result<(), CodegenError> {
        match (e.mode(), e.role()) {
            (_, Role::Server) => e.w.text(" = 0;\n"),
            (Mode::Declaration, Role::Client) => e.w.text(";\n"),
            (_, Role::Client) => {
                e.w.blank();
                e.w.line(level, "{");
                body(e, level + 1)?;
                e.w.line(level, "}");
                e.w.blank();
            }
        }
        Ok(())
    }

    fn write_function<'a>(
        &self,
        e: &mut CppEmitter<'a>,
        level: usize,
        provider: DefinitionProvider<'a>,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server && e.mode() == Mode::Implementation {
            return Ok(());
        }
        let declaring = e.is_declaring();
        let return_type = e.type_name(&variant.return_type)?;

        if declaring {
            e.document_item(
                level,
                Documented::Function {
                    documentation: &variant.documentation,
                    arguments: &variant.arguments,
                },
                Place::Before,
            );
        }
        e.w.indent(level);
        if declaring && e.role() == Role::Server {
            e.w.text("virtual ");
        }
        if declaring {
            e.w.text(format!("{return_type} {}(", variant.name));
        } else {
            e.w.text(format!(
                "{return_type} {}{}(",
                scope_prefix(&variant.scope),
                variant.name
            ));
        }

        for (i, argument) in variant.arguments.iter().enumerate() {
            if i > 0 {
                e.w.text(", ");
            }
            let item = Documented::Argument {
                documentation: &argument.documentation,
                direction: argument.direction,
            };
            if declaring {
                e.document_item(level, item, Place::Before);
            }
            let ty = e.type_name(&argument.ty)?;
            let text = match argument.direction {
                Direction::In => format!("const {ty} & {}", argument.name),
                Direction::InOut => format!("/*in-out*/ {ty} & {}", argument.name),
                Direction::Out => format!("/*out*/ {ty} & {}", argument.name),
            };
            e.w.text(text);
            if declaring {
                e.document_item(level, item, Place::After);
            }
        }
        e.w.text(")");

        self.finish_member(e, level, |e, level| {
            self.marshalling.write_function_body(e, level, provider, variant)
        })
    }

    fn write_property(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server && e.mode() == Mode::Implementation {
            return Ok(());
        }
        let declaring = e.is_declaring();
        let ty = e.type_name(&property.ty)?;
        let qualifier = if declaring {
            String::new()
        } else {
            scope_prefix(&property.scope)
        };
        let prefix = if declaring && e.role() == Role::Server {
            "virtual "
        } else {
            ""
        };

        if declaring {
            e.document_item(level, Documented::Plain(&property.documentation), Place::Before);
        }
        e.w.indent(level);
        e.w.text(format!("{prefix}{ty} {qualifier}get_{}()", property.name));
        self.finish_member(e, level, |e, level| {
            self.marshalling.write_property_getter_body(e, level, property)
        })?;

        if !property.readonly {
            e.w.indent(level);
            e.w.text(format!(
                "{prefix}void {qualifier}set_{}(const {ty} & value)",
                property.name
            ));
            self.finish_member(e, level, |e, level| {
                self.marshalling.write_property_setter_body(e, level, property)
            })?;
        }
        Ok(())
    }
}

impl<M: CppMarshalling> CodeGen for CppCodeGen<M> {
    fn generate(&self, document: &Document, ctx: EmissionContext) -> Result<String, CodegenError> {
        log::debug!("generating C++ code ({ctx})");
        let mut e = CppEmitter::new(document, ctx, self.helper.as_ref());
        for include in self.helper.includes() {
            e.w.line(0, include.render());
        }
        self.marshalling.write_includes(&mut e)?;
        e.w.blank();
        for top_level in document.top_levels() {
            self.write_top_level(&mut e, 0, top_level)?;
        }
        Ok(e.w.into_string())
    }
}
