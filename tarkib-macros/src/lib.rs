//! Procedural macros for Tarkib.
//!
//! `#[derive(Declared)]` turns a struct with named fields into a
//! constructible node: every field becomes a dependency on its own type,
//! and the generated constructor takes each field from the resolved values.
//!
//! ```rust,ignore
//! #[derive(Clone, Declared)]
//! #[tarkib(leaf)]
//! struct RedisUri(String);
//!
//! #[derive(Declared)]
//! struct Config {
//!     redis_client: RedisClient,
//!     #[tarkib(default = RedisUri("localhost:6379".into()))]
//!     redis_uri: RedisUri,
//! }
//! ```
//!
//! Attributes:
//! - `#[tarkib(leaf)]` on the type: no fields, no constructor
//! - `#[tarkib(default = EXPR)]` on a field: default value, converted with `Into`
//! - `#[tarkib(crate = "path")]` on the type: path to the `tarkib` crate
//!
//! A string literal given as a default is itself parsed as an expression,
//! so write `String::from("...")` instead of a bare `"..."`.

use darling::ast::{Data, Style};
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{DeriveInput, parse_macro_input};

#[derive(Debug, FromField)]
#[darling(attributes(tarkib))]
struct DeclaredField {
    ident: Option<syn::Ident>,
    ty: syn::Type,
    #[darling(default, rename = "default")]
    default_value: Option<syn::Expr>,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(tarkib), supports(struct_any))]
struct DeclaredInput {
    ident: syn::Ident,
    generics: syn::Generics,
    data: Data<(), DeclaredField>,
    #[darling(default)]
    leaf: bool,
    #[darling(default, rename = "crate")]
    krate: Option<syn::Path>,
}

/// Derives `tarkib::Declared` for a struct.
#[proc_macro_derive(Declared, attributes(tarkib))]
pub fn derive_declared(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    DeclaredInput::from_derive_input(&input)
        .and_then(expand)
        .unwrap_or_else(|err| err.write_errors())
        .into()
}

fn expand(input: DeclaredInput) -> darling::Result<TokenStream2> {
    let krate = input
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::tarkib));
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = if input.leaf {
        leaf_body(&input, &krate)?
    } else {
        builder_body(&input, &krate)?
    };

    Ok(quote! {
        impl #impl_generics #krate::Declared for #ident #ty_generics #where_clause {
            fn blueprint() -> #krate::Blueprint {
                #body
            }
        }
    })
}

fn leaf_body(input: &DeclaredInput, krate: &syn::Path) -> darling::Result<TokenStream2> {
    let mut errors = darling::Error::accumulator();

    if let Data::Struct(fields) = &input.data {
        for field in fields.iter().filter(|f| f.default_value.is_some()) {
            let err = darling::Error::custom("defaults are not allowed on a #[tarkib(leaf)] type");
            errors.push(match &field.ident {
                Some(ident) => err.with_span(ident),
                None => err.with_span(&field.ty),
            });
        }
    }

    errors.finish()?;
    Ok(quote! { #krate::Blueprint::leaf::<Self>() })
}

fn builder_body(input: &DeclaredInput, krate: &syn::Path) -> darling::Result<TokenStream2> {
    let Data::Struct(fields) = &input.data else {
        return Err(darling::Error::unsupported_shape("enum").with_span(&input.ident));
    };

    match fields.style {
        Style::Unit => {
            return Ok(quote! {
                #krate::Blueprint::builder::<Self>()
                    .construct(|_| ::core::result::Result::Ok(Self))
            });
        }
        Style::Tuple => {
            return Err(darling::Error::custom(
                "tuple structs must be marked #[tarkib(leaf)]; use named fields to declare dependencies",
            )
            .with_span(&input.ident));
        }
        Style::Struct => {}
    }

    let mut declarations = Vec::with_capacity(fields.len());
    let mut initializers = Vec::with_capacity(fields.len());

    for field in fields.iter() {
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.unraw().to_string();
        let ty = &field.ty;

        declarations.push(match &field.default_value {
            Some(expr) => quote! {
                .field_with_default::<#ty>(#name, || -> #ty { ::core::convert::Into::into(#expr) })
            },
            None => quote! { .field::<#ty>(#name) },
        });
        initializers.push(quote! { #ident: fields.take::<#ty>(#name)? });
    }

    Ok(quote! {
        #krate::Blueprint::builder::<Self>()
            #(#declarations)*
            .construct(|fields| ::core::result::Result::Ok(Self { #(#initializers),* }))
    })
}
