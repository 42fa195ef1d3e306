//! Implementation of #[derive(Injectable)] proc-macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Ident, Path};

pub fn derive_injectable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Struct-level `#[injectable(...)]` options.
struct InjectableAttrs {
    constructors: Vec<Ident>,
    try_constructors: Vec<Ident>,
    krate: Path,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Injectable cannot be derived for generic types",
        ));
    }

    let attrs = parse_injectable_attrs(input)?;
    let krate = &attrs.krate;

    let candidates = if attrs.constructors.is_empty() && attrs.try_constructors.is_empty() {
        vec![field_candidate(input, krate)?]
    } else {
        constructor_candidates(&attrs)
    };

    Ok(quote! {
        impl #krate::Canonicalize for #name {
            type Canonical = Self;
        }

        impl #krate::Injectable for #name {
            const AUTOWIRED: bool = true;

            fn candidates<S: #krate::Storage>() -> ::std::vec::Vec<#krate::Candidate<Self, S>> {
                ::std::vec![#(#candidates),*]
            }

            fn boxed_candidates<S: #krate::Storage>(
            ) -> ::std::vec::Vec<#krate::Candidate<::std::boxed::Box<Self>, S>> {
                <Self as #krate::Injectable>::candidates::<S>()
                    .into_iter()
                    .map(|candidate| candidate.map(::std::boxed::Box::new))
                    .collect()
            }

            fn shared_candidates<S: #krate::Storage>(
            ) -> ::std::vec::Vec<#krate::Candidate<::std::sync::Arc<Self>, S>> {
                <Self as #krate::Injectable>::candidates::<S>()
                    .into_iter()
                    .map(|candidate| candidate.map(::std::sync::Arc::new))
                    .collect()
            }
        }

        impl<'c> #krate::Resolve<'c> for #name {
            fn dependency() -> #krate::Dependency {
                #krate::Dependency::value::<Self>()
            }

            fn resolve<S: #krate::Storage>(
                container: &'c #krate::Container<'_, S>,
            ) -> #krate::DiResult<Self> {
                container.resolve_value::<Self>()
            }
        }
    })
}

/// One candidate per named associated function.
fn constructor_candidates(attrs: &InjectableAttrs) -> Vec<TokenStream2> {
    let krate = &attrs.krate;
    let infallible = attrs.constructors.iter().map(|constructor| {
        quote! { #krate::Candidate::from_factory(Self::#constructor) }
    });
    let fallible = attrs.try_constructors.iter().map(|constructor| {
        quote! { #krate::Candidate::from_try_factory(Self::#constructor) }
    });
    infallible.chain(fallible).collect()
}

/// A single candidate that resolves every injected field.
fn field_candidate(input: &DeriveInput, krate: &Path) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Injectable can only be derived for structs unless constructors are named",
            ));
        }
    };

    let mut dependencies = Vec::new();
    let mut values = Vec::new();
    for field in fields.iter() {
        let field_type = &field.ty;
        if is_default(field)? {
            values.push(quote! { ::std::default::Default::default() });
        } else {
            dependencies.push(quote! {
                <#field_type as #krate::Resolve>::dependency()
            });
            values.push(quote! {
                <#field_type as #krate::Resolve>::resolve(container)?
            });
        }
    }

    let construct = match fields {
        Fields::Named(named) => {
            let names = named.named.iter().map(|field| &field.ident);
            quote! { Self { #(#names: #values),* } }
        }
        Fields::Unnamed(_) => quote! { Self(#(#values),*) },
        Fields::Unit => quote! { Self },
    };

    let container = if dependencies.is_empty() {
        quote! { _ }
    } else {
        quote! { container }
    };

    Ok(quote! {
        #krate::Candidate::new(
            ::std::vec![#(#dependencies),*],
            |#container: &#krate::Container<'_, S>| ::std::result::Result::Ok(#construct),
        )
    })
}

fn parse_injectable_attrs(input: &DeriveInput) -> syn::Result<InjectableAttrs> {
    let mut attrs = InjectableAttrs {
        constructors: Vec::new(),
        try_constructors: Vec::new(),
        krate: syn::parse_quote!(::wiring),
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("injectable") {
            continue;
        }
        // Parse #[injectable(constructors(a, b), try_constructors(c), crate = "path")]
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("constructors") {
                meta.parse_nested_meta(|inner| {
                    let constructor = inner.path.require_ident()?;
                    attrs.constructors.push(constructor.clone());
                    Ok(())
                })
            } else if meta.path.is_ident("try_constructors") {
                meta.parse_nested_meta(|inner| {
                    let constructor = inner.path.require_ident()?;
                    attrs.try_constructors.push(constructor.clone());
                    Ok(())
                })
            } else if meta.path.is_ident("crate") {
                let value: syn::LitStr = meta.value()?.parse()?;
                attrs.krate = value.parse()?;
                Ok(())
            } else {
                Err(meta.error(format!(
                    "unsupported injectable option `{}`",
                    meta.path.to_token_stream()
                )))
            }
        })?;
    }

    Ok(attrs)
}

/// Whether a field is marked `#[inject(default)]`.
fn is_default(field: &Field) -> syn::Result<bool> {
    let mut default = false;
    for attr in &field.attrs {
        if attr.path().is_ident("inject") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    default = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `default`"))
                }
            })?;
        }
    }
    Ok(default)
}
