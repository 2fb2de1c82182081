//! Procedural macros for workgraph
//!
//! This crate provides macros to reduce boilerplate in the workgraph entities:
//!
//! - `#[derive(NodeFields)]` - Generate the ordered scalar field descriptors of a node view

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Generate a `NodeFields` implementation listing every scalar field of an entity.
///
/// Fields are emitted in declaration order. Each value is JSON-encoded on its own
/// so callers can decode it by the declared type tag.
///
/// # Usage
///
/// ```ignore
/// #[derive(NodeFields)]
/// pub struct Activity {
///     #[node(skip)]
///     pub id: i64,
///     pub create_time: DateTime<Utc>,
///     #[node(type_name = "ActivityField")]
///     pub changed_field: ActivityField,
///     #[node(skip)]
///     pub edges: ActivityEdges,
/// }
/// ```
///
/// # Attributes
///
/// - `#[node(skip)]` - leave the field out (ids, foreign keys, edges)
/// - `#[node(name = "...")]` - override the descriptor name (defaults to the field name)
/// - `#[node(type_name = "...")]` - override the type tag (defaults to the Rust type)
#[proc_macro_derive(NodeFields, attributes(node))]
pub fn derive_node_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_node_fields(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct NodeFieldAttrs {
    skip: bool,
    name: Option<String>,
    type_name: Option<String>,
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<NodeFieldAttrs> {
    let mut attrs = NodeFieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("node") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                attrs.skip = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.name = Some(lit.value());
                Ok(())
            } else if meta.path.is_ident("type_name") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.type_name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported node attribute"))
            }
        })?;
    }

    Ok(attrs)
}

fn expand_node_fields(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "NodeFields can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "NodeFields can only be derived for structs",
            ));
        }
    };

    let mut entries = Vec::new();
    for field in fields {
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }

        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let ty = &field.ty;

        let field_name = attrs.name.unwrap_or_else(|| ident.to_string());
        let type_name = attrs
            .type_name
            .unwrap_or_else(|| quote!(#ty).to_string().replace(' ', ""));

        entries.push(quote! {
            ::workgraph::ent::Field::new(#type_name, #field_name, &self.#ident)?
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::workgraph::ent::NodeFields for #struct_name #ty_generics #where_clause {
            fn node_fields(
                &self,
            ) -> ::std::result::Result<
                ::std::vec::Vec<::workgraph::ent::Field>,
                ::workgraph::ent::EntError,
            > {
                ::std::result::Result::Ok(::std::vec![#(#entries),*])
            }
        }
    })
}
