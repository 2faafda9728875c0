//! # Factoria Derive Macros
//!
//! This crate provides the procedural macros for `factoria`. It automates the
//! implementation of `TreeSerializable` and `StreamSerializable` for record structs
//! with named fields.
//!
//! Container attributes: `#[factoria(class = "Name", id = 7)]`. The class tag
//! defaults to the struct name; `id` is required by `StreamObject`.
//!
//! Field attributes:
//! - `optional`: a missing element keeps the current value (try-read).
//! - `vector`: the field is a `Vec<T>`, stored as `<key><v>..</v></key>` in text and
//!   as a `u32` count followed by the elements in binary.
//! - `precision = N`: an `f64` written with `N` significant digits.
//! - `rename = "key"`: element name to use instead of the field name.
//! - `skip`: the field is neither written nor read.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitInt, LitStr, parse_macro_input};

/// Derives `factoria::TreeSerializable`.
#[proc_macro_derive(TreeObject, attributes(factoria))]
pub fn derive_tree_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_tree(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Derives `factoria::StreamSerializable`.
#[proc_macro_derive(StreamObject, attributes(factoria))]
pub fn derive_stream_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_stream(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

// --- Internal Data Structures ---

struct ContainerAttrs {
    class: Option<String>,
    id: Option<i32>,
}

struct FieldSpec {
    ident: syn::Ident,
    ty: syn::Type,
    key: String,
    optional: bool,
    vector: bool,
    precision: Option<usize>,
}

fn parse_container(attrs: &[Attribute]) -> syn::Result<ContainerAttrs> {
    let mut class = None;
    let mut id = None;

    for attr in attrs {
        if attr.path().is_ident("factoria") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("class") {
                    let s: LitStr = meta.value()?.parse()?;
                    class = Some(s.value());
                    return Ok(());
                }
                if meta.path.is_ident("id") {
                    let lit: LitInt = meta.value()?.parse()?;
                    id = Some(lit.base10_parse::<i32>()?);
                    return Ok(());
                }
                Err(meta.error("Unknown factoria container attribute. Supported: class, id"))
            })?;
        }
    }
    Ok(ContainerAttrs { class, id })
}

/// Parses field attributes. Returns `None` for skipped fields.
fn parse_field(field: &syn::Field) -> syn::Result<Option<FieldSpec>> {
    let ident = match &field.ident {
        Some(ident) => ident.clone(),
        None => {
            return Err(syn::Error::new_spanned(
                field,
                "factoria derives only support named fields",
            ));
        }
    };

    let mut key = ident.to_string();
    let mut optional = false;
    let mut vector = false;
    let mut precision = None;
    let mut skip = false;

    for attr in &field.attrs {
        if attr.path().is_ident("factoria") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("optional") {
                    optional = true;
                    return Ok(());
                }
                if meta.path.is_ident("vector") {
                    vector = true;
                    return Ok(());
                }
                if meta.path.is_ident("skip") {
                    skip = true;
                    return Ok(());
                }
                if meta.path.is_ident("rename") {
                    let s: LitStr = meta.value()?.parse()?;
                    key = s.value();
                    return Ok(());
                }
                if meta.path.is_ident("precision") {
                    let lit: LitInt = meta.value()?.parse()?;
                    precision = Some(lit.base10_parse::<usize>()?);
                    return Ok(());
                }
                Err(meta.error(
                    "Unknown factoria field attribute. Supported: optional, vector, precision, rename, skip",
                ))
            })?;
        }
    }

    if skip {
        return Ok(None);
    }
    if vector && precision.is_some() {
        return Err(syn::Error::new_spanned(
            field,
            "`precision` cannot be combined with `vector`",
        ));
    }

    Ok(Some(FieldSpec {
        ident,
        ty: field.ty.clone(),
        key,
        optional,
        vector,
        precision,
    }))
}

fn collect_fields(input: &DeriveInput, derive: &str) -> syn::Result<Vec<FieldSpec>> {
    let data_struct = match &input.data {
        Data::Struct(ds) => ds,
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                format!("{derive} only supports structs"),
            ));
        }
    };
    match &data_struct.fields {
        Fields::Named(named) => {
            let mut specs = Vec::new();
            for field in &named.named {
                if let Some(spec) = parse_field(field)? {
                    specs.push(spec);
                }
            }
            Ok(specs)
        }
        Fields::Unit => Ok(Vec::new()),
        Fields::Unnamed(_) => Err(syn::Error::new(
            input.ident.span(),
            format!("{derive} only supports structs with named fields"),
        )),
    }
}

// --- Generator: TreeSerializable ---

fn expand_tree(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let container = parse_container(&input.attrs)?;
    let fields = collect_fields(input, "TreeObject")?;
    let name = &input.ident;
    let class = container.class.unwrap_or_else(|| name.to_string());
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let encode_stmts = fields.iter().map(|f| {
        let fname = &f.ident;
        let key = &f.key;
        if f.vector {
            quote! { ::factoria::tree::write_vector(#key, &self.#fname, out); }
        } else if let Some(p) = f.precision {
            quote! { ::factoria::tree::write_f64_with(#key, self.#fname, #p, out); }
        } else {
            quote! { ::factoria::tree::write(#key, &self.#fname, out); }
        }
    });

    let decode_stmts = fields.iter().map(|f| {
        let fname = &f.ident;
        let key = &f.key;
        match (f.vector, f.optional) {
            (true, true) => quote! {
                ::factoria::tree::try_read_vector(::core::option::Option::Some(node), #key, &mut self.#fname)?;
            },
            (true, false) => quote! {
                self.#fname = ::factoria::tree::read_vector(node, #key)?;
            },
            (false, true) => quote! {
                ::factoria::tree::try_read(::core::option::Option::Some(node), #key, &mut self.#fname)?;
            },
            (false, false) => quote! {
                self.#fname = ::factoria::tree::read(node, #key)?;
            },
        }
    });

    Ok(quote! {
        impl #impl_generics ::factoria::TreeSerializable for #name #ty_generics #where_clause {
            fn class_tag(&self) -> &str {
                #class
            }

            fn encode_to(&self, out: &mut ::std::string::String) {
                #(#encode_stmts)*
            }

            #[allow(unused_variables)]
            fn decode_from(&mut self, node: ::factoria::tree::Node<'_>) -> ::factoria::Result<()> {
                #(#decode_stmts)*
                ::core::result::Result::Ok(())
            }
        }
    })
}

// --- Generator: StreamSerializable ---

fn expand_stream(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let container = parse_container(&input.attrs)?;
    let fields = collect_fields(input, "StreamObject")?;
    let name = &input.ident;
    let id = container.id.ok_or_else(|| {
        syn::Error::new(
            name.span(),
            "StreamObject requires #[factoria(id = N)] on the struct",
        )
    })?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let encode_stmts = fields.iter().map(|f| {
        let fname = &f.ident;
        if f.vector {
            quote! {
                written += ::factoria::codec::write_len(sink, self.#fname.len())?;
                written += ::factoria::codec::write_slice(sink, &self.#fname)?;
            }
        } else {
            quote! {
                written += ::factoria::codec::BinaryValue::write_binary(&self.#fname, sink)?;
            }
        }
    });

    let decode_stmts = fields.iter().map(|f| {
        let fname = &f.ident;
        let fty = &f.ty;
        if f.vector {
            quote! {
                {
                    let (count, bytes) = ::factoria::codec::read_len(source)?;
                    read += bytes;
                    let (values, bytes) = ::factoria::codec::read_vec(source, count)?;
                    self.#fname = values;
                    read += bytes;
                }
            }
        } else {
            quote! {
                {
                    let (value, bytes) = <#fty as ::factoria::codec::BinaryValue>::read_binary(source)?;
                    self.#fname = value;
                    read += bytes;
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::factoria::StreamSerializable for #name #ty_generics #where_clause {
            fn class_id(&self) -> i32 {
                #id
            }

            #[allow(unused_mut, unused_variables)]
            fn encode_payload(&self, sink: &mut dyn ::std::io::Write) -> ::factoria::Result<usize> {
                let mut written = 0usize;
                #(#encode_stmts)*
                ::core::result::Result::Ok(written)
            }

            #[allow(unused_mut, unused_variables)]
            fn decode_payload(&mut self, source: &mut dyn ::std::io::Read) -> ::factoria::Result<usize> {
                let mut read = 0usize;
                #(#decode_stmts)*
                ::core::result::Result::Ok(read)
            }
        }
    })
}
