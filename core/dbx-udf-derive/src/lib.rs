//! DBX UDF Derive — procedural macros for dbx-udf.
//!
//! Provides `#[derive(SqlRecord)]`, mapping a named-field struct to a SQL STRUCT type.

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Derive macro mapping a struct to a STRUCT SemanticType.
///
/// # Example
///
/// ```ignore
/// #[derive(SqlRecord)]
/// pub struct Point {
///     pub x: i32,
///     #[dbx(rename = "label")]
///     pub name: Option<String>,
/// }
/// ```
///
/// Generates `SqlType`, `FromValue` and `IntoValue` implementations. Struct members
/// keep the field declaration order, so a UDF returning `Point` exposes `x` then `label`.
#[proc_macro_derive(SqlRecord, attributes(dbx))]
pub fn derive_sql_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "SqlRecord can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "SqlRecord can only be derived for structs",
            ));
        }
    };
    if fields.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "SqlRecord needs at least one field",
        ));
    }

    let mut idents = Vec::with_capacity(fields.len());
    let mut sql_names = Vec::with_capacity(fields.len());
    let mut types = Vec::with_capacity(fields.len());
    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "unnamed field"))?;
        sql_names.push(extract_rename(field)?.unwrap_or_else(|| ident.to_string()));
        idents.push(ident);
        types.push(&field.ty);
    }

    let expanded = quote! {
        impl #impl_generics ::dbx_udf::function::SqlType for #name #ty_generics #where_clause {
            fn semantic_type() -> ::dbx_udf::types::SemanticType {
                ::dbx_udf::types::SemanticType::Struct(vec![
                    #(
                        ::dbx_udf::types::StructField::new(
                            #sql_names,
                            <#types as ::dbx_udf::function::SqlType>::semantic_type(),
                        )
                    ),*
                ])
            }
        }

        impl #impl_generics ::dbx_udf::function::FromValue for #name #ty_generics #where_clause {
            fn from_value(value: &::dbx_udf::types::Value) -> ::dbx_udf::error::DbxResult<Self> {
                Ok(Self {
                    #(
                        #idents: ::dbx_udf::function::struct_member::<#types>(value, #sql_names)?
                    ),*
                })
            }
        }

        impl #impl_generics ::dbx_udf::function::IntoValue for #name #ty_generics #where_clause {
            fn into_value(self) -> ::dbx_udf::types::Value {
                ::dbx_udf::types::Value::Struct(vec![
                    #(
                        (
                            #sql_names.to_string(),
                            ::dbx_udf::function::IntoValue::into_value(self.#idents),
                        )
                    ),*
                ])
            }
        }
    };

    Ok(expanded)
}

/// `#[dbx(rename = "...")]` on a field
fn extract_rename(field: &syn::Field) -> syn::Result<Option<String>> {
    for attr in &field.attrs {
        if !attr.path().is_ident("dbx") {
            continue;
        }
        let mut rename = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: syn::LitStr = meta.value()?.parse()?;
                rename = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported dbx attribute, expected `rename`"))
            }
        })?;
        if rename.is_some() {
            return Ok(rename);
        }
    }
    Ok(None)
}
