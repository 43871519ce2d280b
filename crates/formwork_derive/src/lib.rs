use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(error) => error.to_compile_error().into(),
    }
}

struct FieldPart {
    lens_def: TokenStream2,
    fields_decl: TokenStream2,
    fields_init: TokenStream2,
    name: String,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FormModel derive currently supports only non-generic structs",
        ));
    }

    let named = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            Fields::Unnamed(_) | Fields::Unit => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "FormModel derive requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "FormModel derive is only supported on structs",
            ));
        }
    };

    let formwork = formwork_path();
    let model = &input.ident;

    let parts: Vec<FieldPart> = named
        .into_iter()
        .filter_map(|field| {
            let field_ident = field.ident?;
            let field_ty = field.ty;
            let name = field_ident.to_string();
            let lens = format_ident!("{model}{}Lens", to_pascal_case(&name));

            let lens_def = quote! {
                #[derive(Clone, Copy, Debug, Default)]
                pub struct #lens;

                impl #formwork::FieldLens<#model> for #lens {
                    type Value = #field_ty;

                    fn key(self) -> #formwork::FieldKey {
                        #formwork::FieldKey::new(#name)
                    }

                    fn get<'a>(self, model: &'a #model) -> &'a Self::Value {
                        &model.#field_ident
                    }

                    fn set(self, model: &mut #model, value: Self::Value) {
                        model.#field_ident = value;
                    }
                }
            };
            let fields_decl = quote!(pub #field_ident: #lens);
            let fields_init = quote!(#field_ident: #lens);

            Some(FieldPart {
                lens_def,
                fields_decl,
                fields_init,
                name,
            })
        })
        .collect();

    let fields_struct = format_ident!("{model}Fields");
    let lens_defs = parts.iter().map(|part| &part.lens_def);
    let fields_decls = parts.iter().map(|part| &part.fields_decl);
    let fields_inits = parts.iter().map(|part| &part.fields_init);
    let names = parts.iter().map(|part| &part.name);

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #fields_struct {
            #(#fields_decls,)*
        }

        impl #formwork::FormModel for #model {
            type Fields = #fields_struct;

            fn fields() -> Self::Fields {
                #fields_struct {
                    #(#fields_inits,)*
                }
            }

            fn field_names() -> &'static [&'static str] {
                &[#(#names),*]
            }
        }

        #(#lens_defs)*
    })
}

fn formwork_path() -> TokenStream2 {
    match crate_name("formwork") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::formwork),
    }
}

fn to_pascal_case(input: &str) -> String {
    input
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
