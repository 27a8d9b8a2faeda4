use proc_macro::TokenStream;
use quote::quote;
use syn::*;
use crate::error;

pub fn from_row(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs: _, vis: _, ident, mut generics, data } = input;
    let Data::Struct(data) = data else {
        error!("only struct are currently supported")
    };

    let body = match data.fields {
        Fields::Named(FieldsNamed { named, .. }) => {
            let fields = named
                .iter()
                .map(|field| {
                    let Some(id) = field.ident.as_ref() else {
                        error!("expected named field")
                    };
                    let label = rename(&field.attrs)?.unwrap_or_else(|| id.to_string());
                    Ok(quote! { #id: row.try_get(#label)?, })
                })
                .collect::<Result<Vec<_>>>()?;
            quote! { Ok(Self { #(#fields)* }) }
        }
        Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
            let fields = (0..unnamed.len()).map(|i| quote! { row.try_get(#i)?, });
            quote! { Ok(Self( #(#fields)* )) }
        }
        Fields::Unit => quote! { Ok(Self) },
    };

    for ty in generics.type_params_mut() {
        ty.bounds.push(syn::parse_quote!(::pgexec::Decode));
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::pgexec::FromRow for #ident #g2 #g3 {
            fn from_row(row: ::pgexec::Row) -> Result<Self, ::pgexec::DecodeError> {
                #body
            }
        }
    }.into())
}

/// `#[sql(rename = "label")]`
fn rename(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut label = None;
    for attr in attrs.iter().filter(|e| e.path().is_ident("sql")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                label = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unknown attribute, expected `rename`"))
            }
        })?;
    }
    Ok(label)
}
