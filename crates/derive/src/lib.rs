#![recursion_limit = "128"]

extern crate proc_macro;

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parenthesized, Result};
use syn::{punctuated::Punctuated, token::Comma, DeriveInput};

struct Receives {
    pub inner: Vec<syn::Type>,
}

impl Parse for Receives {
    fn parse(input: ParseStream) -> Result<Self> {
        let content;
        parenthesized!(content in input);
        let punctuated = Punctuated::<syn::Type, Comma>::parse_terminated(&content)?;

        Ok(Receives {
            inner: punctuated.into_iter().collect(),
        })
    }
}

#[derive(Default)]
struct Tags {
    messages: Vec<syn::Type>,
    discoverable: bool,
}

impl Tags {
    fn parse(ast: &DeriveInput) -> Result<Self> {
        let mut tags = Tags::default();

        for attr in &ast.attrs {
            if let Some(i) = attr.path.get_ident() {
                match i.to_string().as_str() {
                    "receives" => {
                        let receives: Receives = syn::parse2(attr.tokens.clone())?;
                        tags.messages.extend(receives.inner);
                    }

                    "discoverable" => tags.discoverable = true,

                    _ => (),
                }
            }
        }

        Ok(tags)
    }
}

fn subscribe_part(ast: &syn::DeriveInput, messages: &[syn::Type]) -> TokenStream {
    let name = &ast.ident;
    let (_, ty_generics, where_clause) = ast.generics.split_for_impl();
    let mut impl_generics = ast.generics.clone();

    for param in impl_generics.type_params_mut() {
        let bound: syn::TypeParamBound = syn::parse_quote!(::core::marker::Send);
        param.bounds.push(bound);
        let bound: syn::TypeParamBound = syn::parse_quote!(::core::marker::Sync);
        param.bounds.push(bound);
        let bound: syn::TypeParamBound = syn::parse_quote!('static);
        param.bounds.push(bound);
    }

    let (impl_generics, _, _) = impl_generics.split_for_impl();

    quote! {
        impl #impl_generics ::messenger::Subscriber for #name #ty_generics #where_clause {
            fn subscribe<__X, __T>(
                this: &::std::sync::Arc<Self>,
                __messenger: &__X,
                token: __T,
            ) -> ::std::result::Result<(), ::messenger::Error>
            where
                __X: ::messenger::Messenger,
                __T: ::messenger::Token + ::std::clone::Clone,
            {
                #(
                    ::messenger::MessengerExt::register_recipient::<#messages, __T, Self>(
                        __messenger,
                        this,
                        ::std::clone::Clone::clone(&token),
                    )?;
                )*

                let _ = token;
                ::std::result::Result::Ok(())
            }
        }
    }
}

fn declare_part(ast: &syn::DeriveInput) -> Result<TokenStream> {
    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &ast.generics,
            "#[discoverable] is not supported on generic types; \
             call messenger::discovery::declare for each instantiation",
        ));
    }

    let name = &ast.ident;
    let fn_name = syn::Ident::new(
        &format!("__messenger_declare_{}", name.to_string().to_lowercase()),
        Span::call_site(),
    );

    Ok(quote! {
        #[::messenger::__private::ctor::ctor]
        #[allow(non_snake_case)]
        fn #fn_name() {
            ::messenger::discovery::declare::<#name>();
        }
    })
}

/// Implements `messenger::Subscriber` for every message type listed in
/// `#[receives(..)]`. The type must implement `messenger::Recipient<M>` for
/// each of them.
///
/// `#[discoverable]` additionally declares the type for runtime discovery.
#[proc_macro_derive(Subscriber, attributes(receives, discoverable))]
pub fn derive_subscriber(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };

    let tags = match Tags::parse(&ast) {
        Ok(tags) => tags,
        Err(err) => return err.to_compile_error().into(),
    };

    let subscribe_part = subscribe_part(&ast, &tags.messages);
    let declare_part = if tags.discoverable {
        match declare_part(&ast) {
            Ok(tokens) => tokens,
            Err(err) => return err.to_compile_error().into(),
        }
    } else {
        quote! {}
    };

    let tokens = quote! {
        #subscribe_part
        #declare_part
    };

    tokens.into()
}
