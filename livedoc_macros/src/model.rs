use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr};

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let collection = match extract_collection(&input) {
        Ok(collection) => collection,
        Err(err) => return err.to_compile_error().into(),
    };

    let id_field = match extract_id_field(&input) {
        Ok(field) => field,
        Err(err) => return err.to_compile_error().into(),
    };

    let expanded = quote! {
        impl #impl_generics ::livedoc::Model for #name #ty_generics #where_clause {
            const COLLECTION: &'static str = #collection;

            fn id(&self) -> &str {
                &self.#id_field
            }
        }
    };

    TokenStream::from(expanded)
}

fn extract_collection(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        let mut collection = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;

        if let Some(c) = collection {
            return Ok(c);
        }
    }

    Ok(format!("{}s", to_snake_case(&input.ident.to_string())))
}

fn extract_id_field(input: &DeriveInput) -> syn::Result<syn::Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Model derive only supports structs",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Model derive requires named fields",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("model") {
                continue;
            }
            let mut is_id = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    is_id = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `id`"))
                }
            })?;
            if is_id {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .find(|ident| *ident == "id")
        .cloned()
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "Model derive: no field marked with #[model(id)] and no field named `id`",
            )
        })
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
