use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Error, Fields, LitStr, Type};

/// Derive macro for the `Inspect` trait.
///
/// Structs inspect as records named after the struct, with one field per
/// struct field in declaration order. Tuple fields are named `0`, `1`, ...
/// Enum variants without fields inspect as their name; variants with fields
/// inspect as records named after the variant.
///
/// # Attributes
///
/// - `#[inspect(name = "...")]` on the type overrides the record name
/// - `#[inspect(rename = "...")]` on a field overrides its key
/// - `#[inspect(skip)]` on a field leaves it out
///
/// # Example
///
/// ```
/// use glimpse_core::Inspect;
///
/// #[derive(Inspect)]
/// #[inspect(name = "User")]
/// struct Account {
///     #[inspect(rename = "login")]
///     name: String,
///     #[inspect(skip)]
///     password: String,
/// }
/// ```
#[proc_macro_derive(Inspect, attributes(inspect))]
pub fn derive_inspect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_inspect_impl(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct InspectAttrs {
    name: Option<String>,
    rename: Option<String>,
    skip: bool,
}

fn parse_attrs(attrs: &[Attribute]) -> syn::Result<InspectAttrs> {
    let mut parsed = InspectAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("inspect")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                parsed.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("name") {
                parsed.name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip`, `rename = \"...\"` or `name = \"...\"`"))
            }
        })?;
    }

    Ok(parsed)
}

/// A field that takes part in inspection
struct InspectedField {
    key: String,
    binding: syn::Ident,
    ty: Type,
}

/// Collect the inspected fields and the pattern that binds them by reference
fn bind_fields(fields: &Fields) -> syn::Result<(TokenStream2, Vec<InspectedField>)> {
    let mut inspected = Vec::new();

    let pattern = match fields {
        Fields::Named(named) => {
            let mut bindings = Vec::new();
            for field in &named.named {
                let attrs = parse_attrs(&field.attrs)?;
                if attrs.name.is_some() {
                    return Err(Error::new_spanned(field, "`name` applies to types, use `rename`"));
                }
                // Named fields always have an ident
                let Some(ident) = field.ident.clone() else {
                    continue;
                };
                if attrs.skip {
                    bindings.push(quote!(#ident: _));
                    continue;
                }
                let binding = format_ident!("__field_{}", ident);
                bindings.push(quote!(#ident: #binding));
                inspected.push(InspectedField {
                    key: attrs.rename.unwrap_or_else(|| ident.to_string()),
                    binding,
                    ty: field.ty.clone(),
                });
            }
            quote!({ #(#bindings),* })
        }
        Fields::Unnamed(unnamed) => {
            let mut bindings = Vec::new();
            for (index, field) in unnamed.unnamed.iter().enumerate() {
                let attrs = parse_attrs(&field.attrs)?;
                if attrs.skip {
                    bindings.push(quote!(_));
                    continue;
                }
                let binding = format_ident!("__field_{}", index);
                bindings.push(quote!(#binding));
                inspected.push(InspectedField {
                    key: attrs.rename.unwrap_or_else(|| index.to_string()),
                    binding,
                    ty: field.ty.clone(),
                });
            }
            quote!(( #(#bindings),* ))
        }
        Fields::Unit => quote!(),
    };

    Ok((pattern, inspected))
}

fn record_expr(type_name: &str, fields: &[InspectedField]) -> TokenStream2 {
    let entries = fields.iter().map(|field| {
        let key = LitStr::new(&field.key, Span::call_site());
        let binding = &field.binding;
        quote! {
            (::std::string::String::from(#key), ::glimpse_core::snapshot(#binding))
        }
    });

    quote! {
        ::glimpse_core::Value::Record {
            type_name: ::std::option::Option::Some(::std::string::String::from(#type_name)),
            fields: ::std::vec![#(#entries),*],
        }
    }
}

fn derive_inspect_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let container = parse_attrs(&input.attrs)?;
    if container.skip || container.rename.is_some() {
        return Err(Error::new_spanned(
            &input.ident,
            "only `name = \"...\"` is allowed on the type",
        ));
    }

    let name = &input.ident;
    let mut field_types = Vec::new();

    let body = match &input.data {
        Data::Struct(data) => {
            let type_name = container.name.unwrap_or_else(|| name.to_string());
            let (pattern, fields) = bind_fields(&data.fields)?;
            let record = record_expr(&type_name, &fields);
            field_types.extend(fields.into_iter().map(|f| f.ty));
            quote! {
                let Self #pattern = self;
                #record
            }
        }
        Data::Enum(data) => {
            let mut arms = Vec::new();
            for variant in &data.variants {
                let attrs = parse_attrs(&variant.attrs)?;
                let ident = &variant.ident;
                let variant_name = attrs
                    .rename
                    .or(attrs.name)
                    .unwrap_or_else(|| ident.to_string());
                let (pattern, fields) = bind_fields(&variant.fields)?;

                let arm = if matches!(variant.fields, Fields::Unit) {
                    quote! {
                        Self::#ident => ::glimpse_core::Value::Text(
                            ::std::string::String::from(#variant_name)
                        ),
                    }
                } else {
                    let record = record_expr(&variant_name, &fields);
                    quote! { Self::#ident #pattern => #record, }
                };
                arms.push(arm);
                field_types.extend(fields.into_iter().map(|f| f.ty));
            }

            if arms.is_empty() {
                quote! { match *self {} }
            } else {
                quote! {
                    match self {
                        #(#arms)*
                    }
                }
            }
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                name,
                "Inspect cannot be derived for unions",
            ))
        }
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut where_predicates = where_clause
        .map(|w| w.predicates.iter().cloned().collect::<Vec<_>>())
        .unwrap_or_default();

    for ty in &field_types {
        where_predicates.push(syn::parse_quote! {
            #ty: ::glimpse_core::Inspect
        });
    }

    let where_tokens = if where_predicates.is_empty() {
        quote!()
    } else {
        quote!(where #(#where_predicates),*)
    };

    Ok(quote! {
        impl #impl_generics ::glimpse_core::Inspect for #name #ty_generics #where_tokens {
            fn inspect_value(&self) -> ::glimpse_core::Value {
                #body
            }
        }
    })
}
